// ABOUTME: Drives a deployment plan over one shell session and builds the report.
// ABOUTME: Lock release and session close happen on every exit path, including interrupt and panic.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::config::Config;
use crate::diagnostics::Warning;
use crate::shell::Shell;

use super::commands;
use super::error::DeployError;
use super::health::{HealthGate, LiveSecret, LiveSecretProbe};
use super::lock::DeployLock;
use super::report::DeploymentReport;
use super::runner::{Execution, StepRunner};
use super::secret::{SecretError, SecretGuard, SecretSnapshot, SecretValue};
use super::step::{Step, StepAction, StepResult};

pub const STEP_CAPTURE_SECRET: &str = "capture-secret";
pub const STEP_SYNC: &str = "sync-code";
pub const STEP_GUARD_SECRET: &str = "guard-secret";
pub const STEP_REBUILD: &str = "rebuild";
pub const STEP_SETTLE: &str = "settle";
pub const STEP_MIGRATE: &str = "migrate";
pub const STEP_HEALTH: &str = "health-gate";
pub const STEP_VERIFY_SECRET: &str = "verify-live-secret";

/// Runs the fixed deployment sequence for one configured service.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Config,
    runner: StepRunner,
    guard: SecretGuard,
    health: HealthGate,
    live: LiveSecretProbe,
    force_lock: bool,
}

/// How the step sequence ended.
enum Ending {
    Finished(std::thread::Result<Result<(), DeployError>>),
    Interrupted,
}

/// State carried between steps of one run.
#[derive(Default)]
struct RunState {
    snapshot: Option<SecretSnapshot>,
    guarded: Option<bool>,
    expected: Option<SecretValue>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let runner = StepRunner::new(config.migration.hard_failure_markers.clone());
        let guard = SecretGuard::new(config.app.dir.clone(), &config.secret);
        let health = HealthGate::new(&config.health);
        let live = LiveSecretProbe::new(&config.app, config.secret.key.clone());
        Self {
            config,
            runner,
            guard,
            health,
            live,
            force_lock: false,
        }
    }

    /// Break an existing deploy lock instead of refusing to run.
    pub fn force_lock(mut self, force: bool) -> Self {
        self.force_lock = force;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The full deployment sequence, in execution order.
    pub fn plan(&self) -> Vec<Step> {
        let app = &self.config.app;
        let compose_file = app.compose_file.as_deref();
        vec![
            Step::fatal(STEP_CAPTURE_SECRET, StepAction::CaptureSecret),
            Step::fatal(
                STEP_SYNC,
                StepAction::Remote(commands::git_sync(&app.dir, &app.remote, &app.branch)),
            ),
            Step::fatal(STEP_GUARD_SECRET, StepAction::GuardSecret),
            Step::fatal(
                STEP_REBUILD,
                StepAction::Remote(commands::compose_rebuild(
                    &app.dir,
                    compose_file,
                    &app.compose_service,
                )),
            ),
            Step::pause(STEP_SETTLE, app.settle),
            Step::tolerant(
                STEP_MIGRATE,
                StepAction::Remote(commands::compose_migrate(
                    &app.dir,
                    compose_file,
                    &app.compose_service,
                    &self.config.migration.command,
                )),
            ),
            Step::fatal(STEP_HEALTH, StepAction::HealthGate),
            Step::fatal(STEP_VERIFY_SECRET, StepAction::VerifyLiveSecret),
        ]
    }

    /// Read-only verification of the running service.
    pub fn check_plan(&self) -> Vec<Step> {
        vec![
            Step::fatal(STEP_HEALTH, StepAction::HealthGate),
            Step::fatal(STEP_VERIFY_SECRET, StepAction::VerifyLiveSecret),
        ]
    }

    /// Deploy under the service lock. `on_step` sees each result as it is recorded.
    ///
    /// The shell is closed before this returns, whatever happened.
    pub async fn run<S, I, P>(&self, shell: &S, interrupt: I, on_step: P) -> DeploymentReport
    where
        S: Shell + ?Sized,
        I: Future<Output = ()>,
        P: FnMut(&StepResult),
    {
        self.execute(shell, self.plan(), self.config.lock.enabled, interrupt, on_step)
            .await
    }

    /// Health and live-secret checks only. Takes no lock and changes nothing.
    pub async fn check<S, I, P>(&self, shell: &S, interrupt: I, on_step: P) -> DeploymentReport
    where
        S: Shell + ?Sized,
        I: Future<Output = ()>,
        P: FnMut(&StepResult),
    {
        self.execute(shell, self.check_plan(), false, interrupt, on_step)
            .await
    }

    async fn execute<S, I, P>(
        &self,
        shell: &S,
        plan: Vec<Step>,
        locked: bool,
        interrupt: I,
        mut on_step: P,
    ) -> DeploymentReport
    where
        S: Shell + ?Sized,
        I: Future<Output = ()>,
        P: FnMut(&StepResult),
    {
        let mut report = DeploymentReport::new(
            self.config.service.to_string(),
            self.config.server.host.clone(),
        );
        tracing::info!(
            service = %self.config.service,
            host = %self.config.server.host,
            "Starting run with {} step(s)",
            plan.len()
        );

        tokio::pin!(interrupt);
        let mut interrupted = false;

        let lock = if locked {
            let acquire = DeployLock::acquire(
                shell,
                &self.config.service,
                self.config.lock.stale_after,
                self.force_lock,
            );
            tokio::pin!(acquire);
            let raced = tokio::select! {
                result = &mut acquire => Some(result),
                () = &mut interrupt => None,
            };
            // an interrupted acquire still runs to completion so its lock file gets released
            let acquired = match raced {
                Some(result) => result,
                None => {
                    tracing::warn!("Interrupted while acquiring the deploy lock");
                    interrupted = true;
                    acquire.await
                }
            };
            match acquired {
                Ok(lock) => Some(lock),
                Err(e) => {
                    tracing::error!("{}", e);
                    report.interrupted = interrupted;
                    report.error = Some(e.to_string());
                    close_shell(shell, &mut report).await;
                    report.finish();
                    return report;
                }
            }
        } else {
            None
        };

        let ending = if interrupted {
            Ending::Interrupted
        } else {
            let steps = AssertUnwindSafe(self.run_steps(shell, &plan, &mut report, &mut on_step))
                .catch_unwind();
            tokio::select! {
                result = steps => Ending::Finished(result),
                () = &mut interrupt => Ending::Interrupted,
            }
        };

        let mut panic = None;
        match ending {
            Ending::Finished(Ok(Ok(()))) => {}
            Ending::Finished(Ok(Err(e))) => {
                if report.error.is_none() {
                    report.error = Some(e.to_string());
                }
            }
            Ending::Finished(Err(payload)) => {
                tracing::error!("Run aborted by a panic; releasing resources");
                report.error = Some(DeployError::Panicked.to_string());
                panic = Some(payload);
            }
            Ending::Interrupted => {
                tracing::warn!("Interrupted after {} recorded step(s)", report.steps().len());
                report.interrupted = true;
                report.error = Some(DeployError::Interrupted.to_string());
            }
        }

        if let Some(lock) = lock
            && let Err(e) = lock.release().await
        {
            report
                .diagnostics
                .warn(Warning::lock_release(format!("Failed to release deploy lock: {}", e)));
        }
        close_shell(shell, &mut report).await;
        report.finish();

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        report
    }

    async fn run_steps<S, P>(
        &self,
        shell: &S,
        plan: &[Step],
        report: &mut DeploymentReport,
        on_step: &mut P,
    ) -> Result<(), DeployError>
    where
        S: Shell + ?Sized,
        P: FnMut(&StepResult),
    {
        let mut state = RunState::default();

        for step in plan {
            let result = match step.action() {
                StepAction::Pause(duration) => {
                    tracing::debug!("Waiting {:?} before next step", duration);
                    tokio::time::sleep(*duration).await;
                    continue;
                }
                StepAction::Remote(_) => self.runner.run(shell, step).await,
                StepAction::CaptureSecret => self.capture_secret(shell, step, &mut state).await,
                StepAction::GuardSecret => self.guard_secret(shell, step, &mut state, report).await,
                StepAction::HealthGate => self.health_gate(shell, step, report).await,
                StepAction::VerifyLiveSecret => {
                    self.verify_live_secret(shell, step, &state, report).await
                }
            };

            if step.name() == STEP_SYNC && !result.is_failure() {
                report.record_revisions(&result.stdout);
            }

            on_step(&result);
            let failure = result.is_failure().then(|| self.failure(step, &result));
            report.push(result);

            if let Some(error) = failure {
                report.abort(step.name(), &error);
                return Err(error);
            }
        }
        Ok(())
    }

    async fn capture_secret<S: Shell + ?Sized>(
        &self,
        shell: &S,
        step: &Step,
        state: &mut RunState,
    ) -> StepResult {
        let execution = match self.guard.capture(shell).await {
            Ok(snapshot) => {
                let detail = format!("{} captured from {}", snapshot.key, snapshot.source);
                state.snapshot = Some(snapshot);
                Execution::Check {
                    passed: true,
                    detail,
                }
            }
            Err(SecretError::Transport { source, .. }) => Execution::Transport(source),
            Err(e) => Execution::Check {
                passed: false,
                detail: e.to_string(),
            },
        };
        self.runner.record(step, execution)
    }

    async fn guard_secret<S: Shell + ?Sized>(
        &self,
        shell: &S,
        step: &Step,
        state: &mut RunState,
        report: &mut DeploymentReport,
    ) -> StepResult {
        let execution = match self
            .guard
            .verify_and_restore(shell, state.snapshot.as_ref())
            .await
        {
            Ok(status) => {
                let detail = status.summary();
                report.secret_ok = status.secret_ok;
                report.secret_detail = Some(detail.clone());
                state.guarded = Some(status.secret_ok);
                state.expected = status.value;
                Execution::Check {
                    passed: report.secret_ok,
                    detail,
                }
            }
            Err(SecretError::Transport { source, .. }) => Execution::Transport(source),
            Err(e) => Execution::Check {
                passed: false,
                detail: e.to_string(),
            },
        };
        self.runner.record(step, execution)
    }

    async fn health_gate<S: Shell + ?Sized>(
        &self,
        shell: &S,
        step: &Step,
        report: &mut DeploymentReport,
    ) -> StepResult {
        let execution = match self.health.poll(shell).await {
            Ok(outcome) => {
                report.healthy = outcome.healthy;
                Execution::Check {
                    passed: outcome.healthy,
                    detail: outcome.detail(),
                }
            }
            Err(e) => Execution::Transport(e),
        };
        self.runner.record(step, execution)
    }

    async fn verify_live_secret<S: Shell + ?Sized>(
        &self,
        shell: &S,
        step: &Step,
        state: &RunState,
        report: &mut DeploymentReport,
    ) -> StepResult {
        let expected = match &state.expected {
            Some(value) => Some(value.clone()),
            None => match self.guard.read_live(shell).await {
                Ok(value) => value
                    .filter(|v| self.guard.policy().is_valid(Some(v)))
                    .map(SecretValue::new),
                Err(SecretError::Transport { source, .. }) => {
                    report.secret_ok = false;
                    return self.runner.record(step, Execution::Transport(source));
                }
                Err(_) => None,
            },
        };

        let Some(expected) = expected else {
            report.secret_ok = false;
            return self.runner.record(
                step,
                Execution::Check {
                    passed: false,
                    detail: format!("no usable {} in the live config", self.guard.key()),
                },
            );
        };

        let execution = match self
            .live
            .verify(shell, &expected, self.guard.policy())
            .await
        {
            Ok(LiveSecret::Matches) => {
                report.secret_ok = state.guarded.unwrap_or(true);
                Execution::Check {
                    passed: true,
                    detail: format!("running service loaded the configured {}", self.guard.key()),
                }
            }
            Ok(LiveSecret::Mismatch(detail)) | Ok(LiveSecret::Unavailable(detail)) => {
                report.secret_ok = false;
                Execution::Check {
                    passed: false,
                    detail,
                }
            }
            Err(e) => {
                report.secret_ok = false;
                Execution::Transport(e)
            }
        };
        self.runner.record(step, execution)
    }

    fn failure(&self, step: &Step, result: &StepResult) -> DeployError {
        let detail = result.stderr.trim().to_string();
        if result.exit_status.is_none() {
            return DeployError::Transport {
                step: step.name().to_string(),
                detail,
            };
        }

        match step.action() {
            StepAction::GuardSecret => DeployError::SecretUnrecoverable {
                key: self.guard.key().to_string(),
            },
            StepAction::HealthGate => DeployError::HealthTimeout {
                attempts: self.health.max_attempts(),
            },
            StepAction::VerifyLiveSecret => DeployError::LiveSecretMismatch {
                key: self.guard.key().to_string(),
            },
            StepAction::Remote(_) => DeployError::StepFailed {
                step: step.name().to_string(),
                detail: format!(
                    "exit {}: {}",
                    result.exit_status.unwrap_or_default(),
                    detail
                ),
            },
            _ => DeployError::StepFailed {
                step: step.name().to_string(),
                detail,
            },
        }
    }
}

async fn close_shell<S: Shell + ?Sized>(shell: &S, report: &mut DeploymentReport) {
    if let Err(e) = shell.close().await {
        report.diagnostics.warn(Warning::ssh_disconnect(format!(
            "Failed to close session to {}: {}",
            report.host, e
        )));
    }
}
