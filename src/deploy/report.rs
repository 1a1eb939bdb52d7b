// ABOUTME: The per-run deployment report returned to the caller.
// ABOUTME: Step results are append-only; the verdict is derived, never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::{Diagnostics, Warning};

use super::step::{StepOutcome, StepPolicy, StepResult};

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub service: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    steps: Vec<StepResult>,
    pub healthy: bool,
    pub secret_ok: bool,
    /// One-line account of what the secret guard did.
    pub secret_detail: Option<String>,
    pub previous_revision: Option<String>,
    pub deployed_revision: Option<String>,
    /// Name of the step that stopped the run.
    pub aborted_at: Option<String>,
    pub interrupted: bool,
    pub error: Option<String>,
    pub diagnostics: Diagnostics,
    pub success: bool,
}

impl DeploymentReport {
    pub fn new(service: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            host: host.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            healthy: false,
            secret_ok: false,
            secret_detail: None,
            previous_revision: None,
            deployed_revision: None,
            aborted_at: None,
            interrupted: false,
            error: None,
            diagnostics: Diagnostics::default(),
            success: false,
        }
    }

    pub fn push(&mut self, result: StepResult) {
        if result.outcome == StepOutcome::Warning {
            self.diagnostics.warn(Warning::step(&result.step, &result.stderr));
        }
        self.steps.push(result);
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step == name)
    }

    pub fn warnings(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.outcome == StepOutcome::Warning)
            .count()
    }

    /// Take the revisions from the sync step's output: first line before, last line after.
    pub fn record_revisions(&mut self, stdout: &str) {
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        self.previous_revision = lines.next().map(String::from);
        self.deployed_revision = lines.next_back().or(self.previous_revision.as_deref()).map(String::from);
    }

    pub fn abort(&mut self, step: &str, error: impl ToString) {
        self.aborted_at = Some(step.to_string());
        self.error = Some(error.to_string());
    }

    /// Every fatal step succeeded, the service is healthy and the secret is intact.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.aborted_at.is_none()
            && !self.interrupted
            && self.healthy
            && self.secret_ok
            && self
                .steps
                .iter()
                .filter(|r| r.policy == StepPolicy::Fatal)
                .all(|r| r.outcome == StepOutcome::Success)
    }

    /// Stamp the finish time and freeze the verdict.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.success = self.succeeded();
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
