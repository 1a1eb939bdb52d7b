// ABOUTME: Deployment engine: plan, step execution, secret guard, health gate and report.
// ABOUTME: Everything here talks to the host through the Shell trait only.

pub mod commands;
mod error;
mod health;
mod lock;
mod orchestrator;
mod report;
mod runner;
mod secret;
mod step;

pub use error::{DeployError, DeployErrorKind, LockHolderInfo};
pub use health::{
    HealthExpectation, HealthGate, HealthOutcome, LiveSecret, LiveSecretProbe, ProbeResponse,
};
pub use lock::{DeployLock, LockInfo};
pub use orchestrator::{
    Orchestrator, STEP_CAPTURE_SECRET, STEP_GUARD_SECRET, STEP_HEALTH, STEP_MIGRATE,
    STEP_REBUILD, STEP_SETTLE, STEP_SYNC, STEP_VERIFY_SECRET,
};
pub use report::DeploymentReport;
pub use runner::{Execution, StepRunner};
pub use secret::{
    SecretDefect, SecretError, SecretGuard, SecretPolicy, SecretSnapshot, SecretSource,
    SecretStatus, SecretValue,
};
pub use step::{Step, StepAction, StepOutcome, StepPolicy, StepResult};
