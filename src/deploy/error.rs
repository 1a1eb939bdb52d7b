// ABOUTME: Error types for deployment runs.
// ABOUTME: Covers lock contention, step failures, transport loss, secret loss and health timeouts.

use chrono::{DateTime, Utc};

/// Errors that end a deployment run early.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Another run holds the deploy lock for this service.
    #[error("deploy lock held by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    /// The deploy lock could not be acquired or inspected.
    #[error("deploy lock error: {0}")]
    Lock(String),

    /// A fatal step exited non-zero, or a tolerant step hit a hard failure.
    #[error("step '{step}' failed: {detail}")]
    StepFailed { step: String, detail: String },

    /// The session dropped while a step was running.
    #[error("transport lost during step '{step}': {detail}")]
    Transport { step: String, detail: String },

    /// Every restore tier was exhausted without a usable secret.
    #[error("{key} could not be restored to a non-placeholder value")]
    SecretUnrecoverable { key: String },

    /// The service never satisfied the health predicate.
    #[error("health check did not pass after {attempts} attempt(s)")]
    HealthTimeout { attempts: u32 },

    /// The running service does not carry the expected secret.
    #[error("running service has not loaded the restored {key}")]
    LiveSecretMismatch { key: String },

    #[error("deployment interrupted")]
    Interrupted,

    #[error("deployment aborted by an internal panic")]
    Panicked,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    LockHeld,
    Lock,
    StepFailed,
    Transport,
    SecretMismatch,
    HealthTimeout,
    Interrupted,
    Panicked,
}

/// Details about the process holding a deploy lock.
#[derive(Debug, Clone)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl DeployError {
    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld {
            holder,
            pid,
            started_at,
        }
    }

    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::LockHeld { .. } => DeployErrorKind::LockHeld,
            DeployError::Lock(_) => DeployErrorKind::Lock,
            DeployError::StepFailed { .. } => DeployErrorKind::StepFailed,
            DeployError::Transport { .. } => DeployErrorKind::Transport,
            DeployError::SecretUnrecoverable { .. } | DeployError::LiveSecretMismatch { .. } => {
                DeployErrorKind::SecretMismatch
            }
            DeployError::HealthTimeout { .. } => DeployErrorKind::HealthTimeout,
            DeployError::Interrupted => DeployErrorKind::Interrupted,
            DeployError::Panicked => DeployErrorKind::Panicked,
        }
    }

    /// Returns lock holder details if this is a lock contention error.
    pub fn lock_holder_info(&self) -> Option<LockHolderInfo> {
        match self {
            DeployError::LockHeld {
                holder,
                pid,
                started_at,
            } => Some(LockHolderInfo {
                holder: holder.clone(),
                pid: *pid,
                started_at: *started_at,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_failures_share_one_kind() {
        let unrecoverable = DeployError::SecretUnrecoverable {
            key: "JWT_SECRET".into(),
        };
        let mismatch = DeployError::LiveSecretMismatch {
            key: "JWT_SECRET".into(),
        };
        assert_eq!(unrecoverable.kind(), DeployErrorKind::SecretMismatch);
        assert_eq!(mismatch.kind(), DeployErrorKind::SecretMismatch);
        assert!(unrecoverable.lock_holder_info().is_none());
    }

    #[test]
    fn lock_held_exposes_holder() {
        let err = DeployError::lock_held("ci".into(), 7, Utc::now());
        assert_eq!(err.kind(), DeployErrorKind::LockHeld);
        assert_eq!(err.lock_holder_info().map(|i| i.pid), Some(7));
    }
}
