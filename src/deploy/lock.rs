// ABOUTME: Deploy lock to prevent concurrent deployments to the same service.
// ABOUTME: Uses atomic file creation with lock info stored in ~/.local/state/stevedore/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shell::Shell;
use crate::types::ServiceName;

use super::DeployError;

/// Base directory for stevedore state files (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/stevedore";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Service being deployed.
    pub service: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(service: &ServiceName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            service: service.to_string(),
        }
    }

    /// Check if this lock is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        let age = Utc::now() - self.started_at;
        age.to_std().map(|age| age >= stale_after).unwrap_or(false)
    }

    /// Path to the lock file for a service.
    /// Uses $HOME for shell expansion compatibility.
    pub fn lock_path(service: &ServiceName) -> String {
        format!("$HOME/{}/{}.lock", STATE_DIR, service)
    }
}

/// A held deploy lock. Must be released with [`DeployLock::release`].
pub struct DeployLock<'a, S: Shell + ?Sized> {
    shell: &'a S,
    service: ServiceName,
}

impl<S: Shell + ?Sized> std::fmt::Debug for DeployLock<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("service", &self.service)
            .finish()
    }
}

impl<'a, S: Shell + ?Sized> DeployLock<'a, S> {
    /// Acquire a deploy lock for the given service.
    ///
    /// Uses shell noclobber mode for atomic lock acquisition (no TOCTOU race).
    /// Breaks locks older than `stale_after`, or any lock when `force` is set.
    pub async fn acquire(
        shell: &'a S,
        service: &ServiceName,
        stale_after: Duration,
        force: bool,
    ) -> Result<Self, DeployError> {
        let lock_path = LockInfo::lock_path(service);

        Self::ensure_state_dir(shell).await?;

        let lock_info = LockInfo::new(service);
        let lock_json = serde_json::to_string(&lock_info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        // set -C makes > fail if the file already exists
        let acquire_cmd = format!(
            "(set -C; echo {} > \"{}\") 2>/dev/null",
            crate::shell::quote(&lock_json),
            lock_path
        );

        let result = shell
            .exec(&acquire_cmd)
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to acquire lock: {}", e)))?;

        if result.success() {
            tracing::debug!("Acquired deploy lock {}", lock_path);
            return Ok(Self {
                shell,
                service: service.clone(),
            });
        }

        match Self::inspect_existing(shell, &lock_path, stale_after, force).await? {
            Existing::Held(existing) => {
                return Err(DeployError::lock_held(
                    existing.holder,
                    existing.pid,
                    existing.started_at,
                ));
            }
            Existing::Breakable => {}
        }

        tracing::debug!("Removing stale/forced lock at {}", lock_path);
        let removed = shell
            .exec(&format!("rm -f \"{}\"", lock_path))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to break lock: {}", e)))?;
        if !removed.success() {
            tracing::warn!("Could not remove lock {}: {}", lock_path, removed.stderr.trim());
            return Err(DeployError::lock_error(format!(
                "failed to break lock: {}",
                removed.stderr.trim()
            )));
        }

        let result = shell
            .exec(&acquire_cmd)
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to acquire lock: {}", e)))?;

        if !result.success() {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ));
        }

        Ok(Self {
            shell,
            service: service.clone(),
        })
    }

    async fn ensure_state_dir(shell: &S) -> Result<(), DeployError> {
        let cmd = format!("mkdir -p \"$HOME/{}\"", STATE_DIR);
        let output = shell.exec(&cmd).await.map_err(|e| {
            DeployError::lock_error(format!("failed to create state directory: {}", e))
        })?;

        if !output.success() {
            return Err(DeployError::lock_error(format!(
                "failed to create state directory: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn inspect_existing(
        shell: &S,
        lock_path: &str,
        stale_after: Duration,
        force: bool,
    ) -> Result<Existing, DeployError> {
        let output = shell
            .exec(&format!("cat \"{}\"", lock_path))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to read lock info: {}", e)))?;

        if !output.success() {
            tracing::warn!("Lock info unreadable, breaking lock");
            return Ok(Existing::Breakable);
        }

        match serde_json::from_str::<LockInfo>(output.stdout.trim()) {
            Ok(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Ok(Existing::Breakable)
            }
            Ok(existing) if existing.is_stale(stale_after) => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Ok(Existing::Breakable)
            }
            Ok(existing) => Ok(Existing::Held(existing)),
            Err(_) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                Ok(Existing::Breakable)
            }
        }
    }

    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        let lock_path = LockInfo::lock_path(&self.service);
        let output = self
            .shell
            .exec(&format!("rm -f \"{}\"", lock_path))
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to release lock: {}", e)))?;

        if !output.success() {
            return Err(DeployError::lock_error(format!(
                "failed to release lock: {}",
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

enum Existing {
    Held(LockInfo),
    Breakable,
}
