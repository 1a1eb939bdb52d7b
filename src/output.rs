// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{DeploymentReport, Step, StepOutcome, StepResult};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// One line per recorded step.
    pub fn step(&self, result: &StepResult) {
        match self.mode {
            OutputMode::Normal => {
                let marker = match result.outcome {
                    StepOutcome::Success => "✓",
                    StepOutcome::Warning => "!",
                    StepOutcome::Failure => "✗",
                };
                println!("  {} {}", marker, result.step);
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let event = StepEvent {
                    event: "step",
                    step: &result.step,
                    outcome: result.outcome,
                    exit_status: result.exit_status,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// List a plan without running it.
    pub fn plan(&self, steps: &[Step]) {
        match self.mode {
            OutputMode::Json => {
                let entries: Vec<_> = steps
                    .iter()
                    .map(|s| PlanEntry {
                        step: s.name(),
                        policy: s.policy(),
                        action: s.describe(),
                    })
                    .collect();
                if let Ok(json) = serde_json::to_string(&entries) {
                    println!("{json}");
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                for (i, step) in steps.iter().enumerate() {
                    println!(
                        "{:>2}. {:<20} [{:?}] {}",
                        i + 1,
                        step.name(),
                        step.policy(),
                        step.describe()
                    );
                }
            }
        }
    }

    /// Print the final report.
    pub fn report(&self, report: &DeploymentReport) {
        match self.mode {
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(report) {
                    println!("{json}");
                }
            }
            OutputMode::Normal => {
                for warning in report.diagnostics.warnings() {
                    self.warning(&warning.message);
                }
                if let Some(detail) = &report.secret_detail {
                    println!("Secret: {}", detail);
                }
                if let (Some(before), Some(after)) =
                    (&report.previous_revision, &report.deployed_revision)
                {
                    println!("Revision: {} -> {}", short(before), short(after));
                }
                println!(
                    "Healthy: {}  Secret ok: {}  Warnings: {}",
                    yes_no(report.healthy),
                    yes_no(report.secret_ok),
                    report.warnings()
                );
                self.verdict(report);
            }
            OutputMode::Quiet => self.verdict(report),
        }
    }

    fn verdict(&self, report: &DeploymentReport) {
        if report.success {
            self.success(&format!("{} deployed to {}", report.service, report.host));
            return;
        }
        let reason = report
            .error
            .clone()
            .unwrap_or_else(|| "run did not meet its success criteria".to_string());
        match &report.aborted_at {
            Some(step) => self.error(&format!("{} (stopped at {})", reason, step)),
            None => self.error(&reason),
        }
    }

    /// Print a warning (suppressed in quiet/json mode).
    pub fn warning(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            eprintln!("Warning: {message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn short(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StepEvent<'a> {
    event: &'a str,
    step: &'a str,
    outcome: StepOutcome,
    exit_status: Option<u32>,
}

#[derive(Serialize)]
struct PlanEntry {
    step: &'static str,
    policy: crate::deploy::StepPolicy,
    action: String,
}
