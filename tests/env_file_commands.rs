// ABOUTME: Runs the env-file read, write and backup commands through a real /bin/sh.
// ABOUTME: Checks values survive write -> read -> parse unchanged, and the guard restores real files.

use async_trait::async_trait;
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use stevedore::config::SecretConfig;
use stevedore::deploy::commands::{backup_env_value, read_env_value, write_env_value};
use stevedore::deploy::{SecretGuard, SecretSource};
use stevedore::envfile;
use stevedore::shell::{Shell, ShellCommand};
use stevedore::ssh::{self, CommandOutput};
use stevedore::types::EnvKey;

const GOOD: &str = "Jx8v2Qm9LrT4wZk1Np7Hc3Yd6Fs0Gb5Ae";

const HOSTILE: &[&str] = &[
    "Jx8v2Qm9LrT4wZk1Np7Hc3Yd6Fs0Gb5Ae$HOME",
    "`id`$(touch pwned)Jx8v2Qm9LrT4wZk1Np7Hc3",
    "it's-a-secret-with-quotes\"and'both'0123",
    "back\\slash\\n\\'tail-0123456789abcdefghij",
    "  surrounded by spaces 0123456789abcdef  ",
    "hash#not-a-comment=and=equals-0123456789",
    "%s%n&&;|<>*?[a-z]~{} 0123456789abcdefghij",
];

fn key() -> EnvKey {
    EnvKey::new("JWT_SECRET").unwrap()
}

fn sh(command: &ShellCommand) -> std::process::Output {
    Command::new("sh")
        .arg("-c")
        .arg(command.as_str())
        .output()
        .unwrap()
}

fn dir_str(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}

/// Write `value`, then read it back the way the guard does.
fn write_then_read(dir: &Path, value: &str) -> Option<String> {
    let dir = dir_str(dir);
    let write = sh(&write_env_value(&dir, ".env", &key(), value));
    assert!(write.status.success(), "{}", String::from_utf8_lossy(&write.stderr));

    let read = sh(&read_env_value(&dir, ".env", &key()));
    assert!(read.status.success());
    envfile::lookup(&String::from_utf8(read.stdout).unwrap(), &key())
}

mod write_and_read {
    use super::*;

    #[test]
    fn hostile_values_round_trip() {
        for value in HOSTILE {
            let dir = tempfile::tempdir().unwrap();
            assert_eq!(write_then_read(dir.path(), value).as_deref(), Some(*value));
        }
    }

    #[test]
    fn absent_key_is_appended_after_unterminated_last_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "NODE_ENV=production\nPORT=3000").unwrap();

        assert_eq!(write_then_read(dir.path(), GOOD).as_deref(), Some(GOOD));

        let content = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(content.starts_with("NODE_ENV=production\nPORT=3000\n"));
        assert!(content.ends_with(&format!("JWT_SECRET='{}'\n", GOOD)));
    }

    #[test]
    fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(write_then_read(dir.path(), GOOD).as_deref(), Some(GOOD));
    }

    #[test]
    fn export_line_is_replaced_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "A=1\nexport JWT_SECRET=dev-secret-not-for-production\nB=2\n",
        )
        .unwrap();

        write_then_read(dir.path(), GOOD);

        let content = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert_eq!(content, format!("A=1\nJWT_SECRET='{}'\nB=2\n", GOOD));
    }

    #[test]
    fn duplicate_assignments_collapse_to_one() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "JWT_SECRET=first\nJWT_SECRET_OLD=keep\nJWT_SECRET=second\n",
        )
        .unwrap();

        assert_eq!(write_then_read(dir.path(), GOOD).as_deref(), Some(GOOD));

        let content = fs::read_to_string(dir.path().join(".env")).unwrap();
        assert_eq!(content.matches("JWT_SECRET=").count(), 1);
        assert!(content.contains("JWT_SECRET_OLD=keep\n"));
        assert!(!dir.path().join(".env.stevedore.tmp").exists());
    }

    #[test]
    fn backup_copy_reads_back_the_live_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir_str(dir.path());
        for value in HOSTILE {
            write_then_read(dir.path(), value);

            let backup = sh(&backup_env_value(&path, ".env", &key(), ".stevedore/JWT_SECRET.backup"));
            assert!(backup.status.success());

            let read = sh(&read_env_value(&path, ".stevedore/JWT_SECRET.backup", &key()));
            let content = String::from_utf8(read.stdout).unwrap();
            assert_eq!(envfile::lookup(&content, &key()).as_deref(), Some(*value));
        }
    }

    #[test]
    fn absent_key_reads_as_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "OTHER=1\n").unwrap();

        let read = sh(&read_env_value(&dir_str(dir.path()), ".env", &key()));
        assert_eq!(read.status.code(), Some(1));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_single_line_value_round_trips(value in "[^\\x00\\n\\r]{1,48}") {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "export JWT_SECRET=old\nPORT=3000\n").unwrap();
        prop_assert_eq!(write_then_read(dir.path(), &value), Some(value));
    }
}

/// Runs commands on this machine, in place of an SSH session.
struct LocalShell;

#[async_trait]
impl Shell for LocalShell {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await?;
        Ok(CommandOutput::new(
            output.status.code().unwrap_or(255) as u32,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }

    async fn close(&self) -> ssh::Result<()> {
        Ok(())
    }
}

mod guard_on_real_files {
    use super::*;

    fn guard(dir: &Path, fallback: Option<&str>) -> SecretGuard {
        let config = SecretConfig {
            fallback_file: fallback.map(String::from),
            ..SecretConfig::default()
        };
        SecretGuard::new(dir_str(dir), &config)
    }

    fn live(dir: &Path) -> Option<String> {
        let content = fs::read_to_string(dir.join(".env")).ok()?;
        envfile::lookup(&content, &key())
    }

    #[tokio::test]
    async fn clobbered_secret_is_restored_to_the_captured_value() {
        for value in HOSTILE {
            let dir = tempfile::tempdir().unwrap();
            let env = format!("NODE_ENV=production\nJWT_SECRET={}\n", envfile::quote_value(value));
            fs::write(dir.path().join(".env"), env).unwrap();
            let guard = guard(dir.path(), None);

            let snapshot = guard.capture(&LocalShell).await.unwrap();
            assert_eq!(snapshot.source, SecretSource::Live);

            // the sync resets .env to the committed template
            fs::write(
                dir.path().join(".env"),
                "NODE_ENV=production\nJWT_SECRET=dev-secret-not-for-production\n",
            )
            .unwrap();

            let status = guard
                .verify_and_restore(&LocalShell, Some(&snapshot))
                .await
                .unwrap();

            assert!(status.secret_ok, "{}", status.summary());
            assert_eq!(status.resolved_by, Some(SecretSource::Backup));
            assert_eq!(live(dir.path()).as_deref(), Some(*value));
            assert_eq!(status.value.unwrap().expose(), snapshot.value.expose());
        }
    }

    #[tokio::test]
    async fn fallback_value_lands_in_live_file_after_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "JWT_SECRET=changeme\n").unwrap();
        fs::write(dir.path().join("secrets.env"), format!("JWT_SECRET={}\n", GOOD)).unwrap();
        let guard = guard(dir.path(), Some("secrets.env"));

        let status = guard.verify_and_restore(&LocalShell, None).await.unwrap();

        assert!(status.secret_ok);
        assert_eq!(
            status.attempted,
            vec![SecretSource::Live, SecretSource::Backup, SecretSource::SecondarySource]
        );
        assert_eq!(live(dir.path()).as_deref(), Some(GOOD));
    }
}
