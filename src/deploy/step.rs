// ABOUTME: Step definitions and per-step results for a deployment run.
// ABOUTME: A run is an ordered list of steps; each result is recorded once and never changed.

use serde::Serialize;
use std::time::Duration;

use crate::shell::ShellCommand;

/// How a non-zero exit is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Non-zero exit aborts the run.
    Fatal,
    /// Non-zero exit or stderr notices are recorded as warnings.
    Tolerant,
    /// Not classified and not recorded (pauses).
    Unclassified,
}

/// Classified outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Warning,
    Failure,
}

/// What a step does when it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// A single remote command.
    Remote(ShellCommand),
    /// Read the secret, write the durable backup, keep a snapshot.
    CaptureSecret,
    /// Verify the secret survived the sync, restoring it through the fallback tiers.
    GuardSecret,
    /// Wait before the next step.
    Pause(Duration),
    /// Poll the health endpoint.
    HealthGate,
    /// Confirm the running service loaded the expected secret.
    VerifyLiveSecret,
}

/// One entry of a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    name: &'static str,
    action: StepAction,
    policy: StepPolicy,
}

impl Step {
    pub fn fatal(name: &'static str, action: StepAction) -> Self {
        Self {
            name,
            action,
            policy: StepPolicy::Fatal,
        }
    }

    pub fn tolerant(name: &'static str, action: StepAction) -> Self {
        Self {
            name,
            action,
            policy: StepPolicy::Tolerant,
        }
    }

    pub fn pause(name: &'static str, duration: Duration) -> Self {
        Self {
            name,
            action: StepAction::Pause(duration),
            policy: StepPolicy::Unclassified,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn action(&self) -> &StepAction {
        &self.action
    }

    pub fn policy(&self) -> StepPolicy {
        self.policy
    }

    /// Human description for plan listings. Never includes secret values.
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Remote(cmd) => cmd.to_string(),
            StepAction::CaptureSecret => "read secret, write durable backup".to_string(),
            StepAction::GuardSecret => "verify secret; restore from backup, then fallback source".to_string(),
            StepAction::Pause(d) => format!("wait {}s", d.as_secs()),
            StepAction::HealthGate => "poll health endpoint".to_string(),
            StepAction::VerifyLiveSecret => "compare running service's secret with config".to_string(),
        }
    }
}

/// The recorded result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: String,
    pub policy: StepPolicy,
    /// `None` when the step never produced an exit status (transport loss).
    pub exit_status: Option<u32>,
    pub stdout: String,
    pub stderr: String,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn is_failure(&self) -> bool {
        self.outcome == StepOutcome::Failure
    }
}
