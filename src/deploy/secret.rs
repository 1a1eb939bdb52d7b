// ABOUTME: Keeps a named secret from being left at a placeholder after a destructive sync.
// ABOUTME: Captures a durable backup first, then verifies and restores through three ordered tiers.

use snafu::{ResultExt, Snafu};
use std::fmt;

use crate::config::SecretConfig;
use crate::envfile;
use crate::shell::Shell;
use crate::ssh;
use crate::types::EnvKey;

use super::commands;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SecretError {
    #[snafu(display("transport lost while trying to {action} {file}: {source}"))]
    Transport {
        action: &'static str,
        file: String,
        source: ssh::Error,
    },

    #[snafu(display("failed to write {file}: {stderr}"))]
    WriteFailed { file: String, stderr: String },

    #[snafu(display("no usable {key} in the live config, the backup or the fallback source"))]
    NoUsableValue { key: String },
}

/// A secret value. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", envfile::mask(&self.0))
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&envfile::mask(&self.0))
    }
}

/// Where a secret value was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// The live configuration file.
    Live,
    /// The durable backup written before the sync.
    Backup,
    /// The named fallback configuration source.
    SecondarySource,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Live => write!(f, "live config"),
            SecretSource::Backup => write!(f, "backup"),
            SecretSource::SecondarySource => write!(f, "fallback source"),
        }
    }
}

/// Why a value (or a restore attempt) was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretDefect {
    Missing,
    Empty,
    Multiline,
    Placeholder(String),
    TooShort { len: usize, min: usize },
    WriteFailed(String),
    /// The live file reads back a different value than the one written.
    NotPersisted,
}

impl fmt::Display for SecretDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretDefect::Missing => write!(f, "missing"),
            SecretDefect::Empty => write!(f, "empty"),
            SecretDefect::Multiline => write!(f, "spans multiple lines"),
            SecretDefect::Placeholder(pattern) => write!(f, "matches placeholder '{}'", pattern),
            SecretDefect::TooShort { len, min } => {
                write!(f, "too short ({} chars, need {})", len, min)
            }
            SecretDefect::WriteFailed(stderr) => write!(f, "restore write failed: {}", stderr),
            SecretDefect::NotPersisted => write!(f, "restored value did not read back unchanged"),
        }
    }
}

/// Rules a value must satisfy to count as a real secret.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    placeholders: Vec<String>,
    min_length: usize,
}

impl SecretPolicy {
    pub fn new(placeholders: Vec<String>, min_length: usize) -> Self {
        Self {
            placeholders: placeholders.into_iter().map(|p| p.to_lowercase()).collect(),
            min_length,
        }
    }

    pub fn check(&self, value: Option<&str>) -> Result<(), SecretDefect> {
        let value = value.ok_or(SecretDefect::Missing)?;
        if value.trim().is_empty() {
            return Err(SecretDefect::Empty);
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(SecretDefect::Multiline);
        }

        let lowered = value.to_lowercase();
        if let Some(pattern) = self.placeholders.iter().find(|p| lowered.contains(p.as_str())) {
            return Err(SecretDefect::Placeholder(pattern.clone()));
        }

        let len = value.chars().count();
        if len < self.min_length {
            return Err(SecretDefect::TooShort {
                len,
                min: self.min_length,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self, value: Option<&str>) -> bool {
        self.check(value).is_ok()
    }
}

/// The secret as captured before the destructive step.
#[derive(Debug, Clone)]
pub struct SecretSnapshot {
    pub key: EnvKey,
    pub value: SecretValue,
    pub source: SecretSource,
}

/// Result of [`SecretGuard::verify_and_restore`].
#[derive(Debug, Clone)]
pub struct SecretStatus {
    pub secret_ok: bool,
    /// The tier that produced the final value, `Live` when nothing was restored.
    pub resolved_by: Option<SecretSource>,
    /// Tiers consulted, in order.
    pub attempted: Vec<SecretSource>,
    /// Rejections collected along the way.
    pub defects: Vec<(SecretSource, SecretDefect)>,
    /// The live value after the guard finished, when valid.
    pub value: Option<SecretValue>,
}

impl SecretStatus {
    fn new() -> Self {
        Self {
            secret_ok: false,
            resolved_by: None,
            attempted: Vec::new(),
            defects: Vec::new(),
            value: None,
        }
    }

    fn resolved(mut self, source: SecretSource, value: SecretValue) -> Self {
        self.secret_ok = true;
        self.resolved_by = Some(source);
        self.value = Some(value);
        self
    }

    /// One-line description for the report.
    pub fn summary(&self) -> String {
        let rejected = self
            .defects
            .iter()
            .map(|(source, defect)| format!("{}: {}", source, defect))
            .collect::<Vec<_>>()
            .join("; ");

        match (self.secret_ok, self.resolved_by) {
            (true, Some(SecretSource::Live)) => "intact".to_string(),
            (true, Some(source)) => format!("restored from {} ({})", source, rejected),
            _ => format!("unrecoverable ({})", rejected),
        }
    }
}

/// Protects one key of the live configuration file across a destructive sync.
#[derive(Debug, Clone)]
pub struct SecretGuard {
    key: EnvKey,
    dir: String,
    env_file: String,
    backup_file: String,
    fallback_file: Option<String>,
    policy: SecretPolicy,
}

impl SecretGuard {
    pub fn new(dir: impl Into<String>, config: &SecretConfig) -> Self {
        Self {
            key: config.key.clone(),
            dir: dir.into(),
            env_file: config.env_file.clone(),
            backup_file: config.backup_path(),
            fallback_file: config.fallback_file.clone(),
            policy: SecretPolicy::new(config.placeholders.clone(), config.min_length),
        }
    }

    pub fn key(&self) -> &EnvKey {
        &self.key
    }

    pub fn policy(&self) -> &SecretPolicy {
        &self.policy
    }

    /// Read `key` from a file on the host. Absent key or unreadable file is `None`.
    pub async fn read_value<S: Shell + ?Sized>(
        &self,
        shell: &S,
        file: &str,
    ) -> Result<Option<String>, SecretError> {
        let output = shell
            .exec(commands::read_env_value(&self.dir, file, &self.key).as_str())
            .await
            .context(TransportSnafu { action: "read", file })?;

        match output.exit_code {
            0 => Ok(envfile::lookup(&output.stdout, &self.key)),
            1 => Ok(None),
            code => {
                tracing::warn!(
                    "Could not read {} from {} (exit {}): {}",
                    self.key,
                    file,
                    code,
                    output.stderr.trim()
                );
                Ok(None)
            }
        }
    }

    pub async fn read_live<S: Shell + ?Sized>(&self, shell: &S) -> Result<Option<String>, SecretError> {
        self.read_value(shell, &self.env_file).await
    }

    async fn write_live<S: Shell + ?Sized>(
        &self,
        shell: &S,
        value: &SecretValue,
    ) -> Result<(), SecretError> {
        let command = commands::write_env_value(&self.dir, &self.env_file, &self.key, value.expose());
        let output = shell
            .exec(command.as_str())
            .await
            .context(TransportSnafu {
                action: "write",
                file: self.env_file.as_str(),
            })?;

        if !output.success() {
            return WriteFailedSnafu {
                file: self.env_file.as_str(),
                stderr: output.stderr.trim(),
            }
            .fail();
        }
        Ok(())
    }

    /// Copy the key's line from `source_file` into the durable backup.
    async fn write_backup<S: Shell + ?Sized>(
        &self,
        shell: &S,
        source_file: &str,
    ) -> Result<(), SecretError> {
        let command = commands::backup_env_value(&self.dir, source_file, &self.key, &self.backup_file);
        let output = shell
            .exec(command.as_str())
            .await
            .context(TransportSnafu {
                action: "back up",
                file: self.backup_file.as_str(),
            })?;

        if !output.success() {
            return WriteFailedSnafu {
                file: self.backup_file.as_str(),
                stderr: output.stderr.trim(),
            }
            .fail();
        }
        Ok(())
    }

    /// Capture the current secret before the destructive step.
    ///
    /// A valid live value is written to the backup file. If the live value is
    /// already unusable, an existing valid backup is kept untouched; failing
    /// that, a valid fallback value seeds the backup.
    pub async fn capture<S: Shell + ?Sized>(&self, shell: &S) -> Result<SecretSnapshot, SecretError> {
        let live = self.read_live(shell).await?;
        match self.policy.check(live.as_deref()) {
            Ok(()) => {
                self.write_backup(shell, &self.env_file).await?;
                tracing::info!("Backed up {} to {}", self.key, self.backup_file);
                return Ok(self.snapshot(live, SecretSource::Live));
            }
            Err(defect) => {
                tracing::warn!(
                    "Live {} is {} before sync; keeping the existing backup",
                    self.key,
                    defect
                );
            }
        }

        let backup = self.read_value(shell, &self.backup_file).await?;
        if self.policy.is_valid(backup.as_deref()) {
            return Ok(self.snapshot(backup, SecretSource::Backup));
        }

        if let Some(fallback) = &self.fallback_file {
            let value = self.read_value(shell, fallback).await?;
            if self.policy.is_valid(value.as_deref()) {
                self.write_backup(shell, fallback).await?;
                tracing::info!("Seeded {} backup from {}", self.key, fallback);
                return Ok(self.snapshot(value, SecretSource::SecondarySource));
            }
        }

        NoUsableValueSnafu {
            key: self.key.as_str(),
        }
        .fail()
    }

    fn snapshot(&self, value: Option<String>, source: SecretSource) -> SecretSnapshot {
        SecretSnapshot {
            key: self.key.clone(),
            value: SecretValue::new(value.unwrap_or_default()),
            source,
        }
    }

    /// Verify the live secret after the destructive step and restore it if needed.
    ///
    /// Tiers run strictly in order and each re-reads the live file before
    /// declaring success: the live value itself, then the backup file (or the
    /// in-memory snapshot when the file is unusable), then the fallback source.
    pub async fn verify_and_restore<S: Shell + ?Sized>(
        &self,
        shell: &S,
        snapshot: Option<&SecretSnapshot>,
    ) -> Result<SecretStatus, SecretError> {
        let mut status = SecretStatus::new();

        status.attempted.push(SecretSource::Live);
        let live = self.read_live(shell).await?;
        match self.policy.check(live.as_deref()) {
            Ok(()) => {
                let value = SecretValue::new(live.unwrap_or_default());
                return Ok(status.resolved(SecretSource::Live, value));
            }
            Err(defect) => {
                tracing::warn!("Live {} is {} after sync", self.key, defect);
                status.defects.push((SecretSource::Live, defect));
            }
        }

        status.attempted.push(SecretSource::Backup);
        let backup = self.read_value(shell, &self.backup_file).await?;
        let candidate = match self.policy.check(backup.as_deref()) {
            Ok(()) => backup.map(SecretValue::new),
            Err(defect) => {
                status.defects.push((SecretSource::Backup, defect));
                snapshot
                    .filter(|s| self.policy.is_valid(Some(s.value.expose())))
                    .map(|s| s.value.clone())
            }
        };
        if let Some(candidate) = candidate
            && let Some(value) = self
                .restore(shell, &candidate, SecretSource::Backup, &mut status)
                .await?
        {
            return Ok(status.resolved(SecretSource::Backup, value));
        }

        if let Some(fallback) = &self.fallback_file {
            status.attempted.push(SecretSource::SecondarySource);
            let value = self.read_value(shell, fallback).await?;
            match self.policy.check(value.as_deref()) {
                Ok(()) => {
                    let candidate = SecretValue::new(value.unwrap_or_default());
                    if let Some(value) = self
                        .restore(shell, &candidate, SecretSource::SecondarySource, &mut status)
                        .await?
                    {
                        return Ok(status.resolved(SecretSource::SecondarySource, value));
                    }
                }
                Err(defect) => status.defects.push((SecretSource::SecondarySource, defect)),
            }
        }

        tracing::error!("{} could not be restored: {}", self.key, status.summary());
        Ok(status)
    }

    /// Write `candidate` into the live file and re-read it.
    async fn restore<S: Shell + ?Sized>(
        &self,
        shell: &S,
        candidate: &SecretValue,
        tier: SecretSource,
        status: &mut SecretStatus,
    ) -> Result<Option<SecretValue>, SecretError> {
        match self.write_live(shell, candidate).await {
            Ok(()) => {}
            Err(SecretError::WriteFailed { stderr, .. }) => {
                status.defects.push((tier, SecretDefect::WriteFailed(stderr)));
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let reread = self.read_live(shell).await?;
        if let Err(defect) = self.policy.check(reread.as_deref()) {
            status.defects.push((tier, defect));
            return Ok(None);
        }
        if reread.as_deref() != Some(candidate.expose()) {
            status.defects.push((tier, SecretDefect::NotPersisted));
            return Ok(None);
        }

        tracing::info!("Restored {} from {} ({})", self.key, tier, candidate);
        Ok(Some(candidate.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SecretPolicy {
        SecretPolicy::new(vec!["dev-secret".into(), "CHANGE_ME".into()], 32)
    }

    #[test]
    fn rejects_missing_and_empty() {
        assert_eq!(policy().check(None), Err(SecretDefect::Missing));
        assert_eq!(policy().check(Some("  ")), Err(SecretDefect::Empty));
    }

    #[test]
    fn placeholder_match_is_case_insensitive() {
        let value = "DEV-SECRET-qscrap-not-for-production-0123456789abcdef";
        assert_eq!(
            policy().check(Some(value)),
            Err(SecretDefect::Placeholder("dev-secret".into()))
        );
        assert_eq!(
            policy().check(Some("change_me")),
            Err(SecretDefect::Placeholder("change_me".into()))
        );
    }

    #[test]
    fn short_values_are_rejected() {
        assert_eq!(
            policy().check(Some("abc")),
            Err(SecretDefect::TooShort { len: 3, min: 32 })
        );
    }

    #[test]
    fn long_random_value_is_valid() {
        assert!(policy().is_valid(Some("Jx8v2Qm9LrT4wZk1Np7Hc3Yd6Fs0Gb5Ae")));
    }

    #[test]
    fn secret_value_debug_is_masked() {
        let value = SecretValue::new("Jx8v2Qm9LrT4wZk1Np7Hc3Yd6Fs0Gb5Ae");
        let debug = format!("{:?}", value);
        assert!(!debug.contains("LrT4wZk1"));
        assert!(debug.contains("Jx8v"));
    }
}
