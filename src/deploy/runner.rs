// ABOUTME: Executes steps over a shell and classifies their outcomes.
// ABOUTME: Maps (exit status, stderr) plus the step policy to Success, Warning or Failure.

use crate::shell::Shell;
use crate::ssh::{self, CommandOutput};

use super::step::{Step, StepAction, StepOutcome, StepPolicy, StepResult};

/// Exit statuses at or above this mean the process died from a signal.
const SIGNAL_EXIT_BASE: u32 = 128;

/// Raw result of performing a step, before classification.
#[derive(Debug)]
pub enum Execution {
    /// The remote command ran to completion.
    Completed(CommandOutput),
    /// The transport failed before an exit status arrived.
    Transport(ssh::Error),
    /// A built-in check produced a verdict.
    Check { passed: bool, detail: String },
}

/// Runs steps and turns what happened into [`StepResult`]s.
#[derive(Debug, Clone, Default)]
pub struct StepRunner {
    hard_failure_markers: Vec<String>,
}

impl StepRunner {
    pub fn new(hard_failure_markers: Vec<String>) -> Self {
        Self {
            hard_failure_markers,
        }
    }

    /// Execute a remote step once and classify it.
    pub async fn run<S: Shell + ?Sized>(&self, shell: &S, step: &Step) -> StepResult {
        let execution = match step.action() {
            StepAction::Remote(command) => {
                tracing::debug!(step = step.name(), "exec: {}", command);
                match shell.exec(command.as_str()).await {
                    Ok(output) => Execution::Completed(output),
                    Err(e) => Execution::Transport(e),
                }
            }
            _ => Execution::Check {
                passed: false,
                detail: format!("step '{}' has no remote command", step.name()),
            },
        };
        self.record(step, execution)
    }

    /// Classify an execution into the result recorded for `step`.
    pub fn record(&self, step: &Step, execution: Execution) -> StepResult {
        let policy = step.policy();
        let (exit_status, stdout, stderr, outcome) = match execution {
            Execution::Completed(output) => {
                let outcome = self.classify(policy, &output);
                (
                    Some(output.exit_code),
                    output.stdout,
                    output.stderr,
                    outcome,
                )
            }
            Execution::Transport(e) => (None, String::new(), e.to_string(), StepOutcome::Failure),
            Execution::Check { passed, detail } => {
                let outcome = match (passed, policy) {
                    (true, _) | (false, StepPolicy::Unclassified) => StepOutcome::Success,
                    (false, StepPolicy::Tolerant) => StepOutcome::Warning,
                    (false, StepPolicy::Fatal) => StepOutcome::Failure,
                };
                let code = if passed { 0 } else { 1 };
                if passed {
                    (Some(code), detail, String::new(), outcome)
                } else {
                    (Some(code), String::new(), detail, outcome)
                }
            }
        };

        match outcome {
            StepOutcome::Success => tracing::info!(step = step.name(), "step succeeded"),
            StepOutcome::Warning => tracing::warn!(
                step = step.name(),
                exit_status,
                "step completed with warnings: {}",
                stderr.trim()
            ),
            StepOutcome::Failure => tracing::error!(
                step = step.name(),
                exit_status,
                "step failed: {}",
                stderr.trim()
            ),
        }

        StepResult {
            step: step.name().to_string(),
            policy,
            exit_status,
            stdout,
            stderr,
            outcome,
        }
    }

    /// Classification policy for a completed command.
    pub fn classify(&self, policy: StepPolicy, output: &CommandOutput) -> StepOutcome {
        match policy {
            StepPolicy::Unclassified => StepOutcome::Success,
            StepPolicy::Fatal if output.success() => StepOutcome::Success,
            StepPolicy::Fatal => StepOutcome::Failure,
            StepPolicy::Tolerant if output.success() => {
                if output.stderr.trim().is_empty() {
                    StepOutcome::Success
                } else {
                    StepOutcome::Warning
                }
            }
            StepPolicy::Tolerant if self.is_hard_failure(output) => StepOutcome::Failure,
            StepPolicy::Tolerant => StepOutcome::Warning,
        }
    }

    fn is_hard_failure(&self, output: &CommandOutput) -> bool {
        output.exit_code >= SIGNAL_EXIT_BASE
            || self
                .hard_failure_markers
                .iter()
                .any(|marker| output.stderr.contains(marker.as_str()))
    }
}
