// ABOUTME: The allow-listed set of remote commands a deployment may run.
// ABOUTME: Each builder takes typed parameters and quotes them; no step composes raw strings.

use std::path::Path;
use std::time::Duration;

use crate::envfile;
use crate::shell::ShellCommand;
use crate::types::EnvKey;

/// Environment variable that carries a value into the awk rewrite.
const VALUE_VAR: &str = "STEVEDORE_VALUE";

/// Replaces the first `KEY=` (or `export KEY=`) line, drops later duplicates,
/// appends the assignment if the key is absent.
const REWRITE_PROGRAM: &str = r#"index($0, k "=") == 1 || index($0, "export " k "=") == 1 { if (!done) print k "=" ENVIRON["STEVEDORE_VALUE"]; done = 1; next } { print } END { if (!done) print k "=" ENVIRON["STEVEDORE_VALUE"] }"#;

fn key_pattern(key: &EnvKey) -> String {
    format!("^(export[[:space:]]+)?{}=", key)
}

fn tmp_path(path: &str) -> String {
    format!("{}.stevedore.tmp", path)
}

/// Print every assignment line for `key` in `file`.
///
/// Exit status follows grep: 0 found, 1 absent, 2 unreadable file.
pub fn read_env_value(dir: &str, file: &str, key: &EnvKey) -> ShellCommand {
    ShellCommand::new("grep")
        .arg("-E")
        .arg(key_pattern(key))
        .arg(file)
        .in_dir(dir)
}

/// Set `key` to `value` in `file` by whole-line substitution, or append it.
///
/// The value is written single-quoted (see [`envfile::quote_value`]) and
/// reaches awk through its environment, so awk never interprets it.
///
/// The file is rewritten in place (`cat tmp > file`) so its inode, owner and
/// mode survive for bind mounts.
pub fn write_env_value(dir: &str, file: &str, key: &EnvKey, value: &str) -> ShellCommand {
    let tmp = tmp_path(file);
    ShellCommand::new("umask 077")
        .and(ShellCommand::new("touch").arg(file))
        .and(
            ShellCommand::new("awk")
                .arg("-v")
                .arg(format!("k={}", key))
                .arg(REWRITE_PROGRAM)
                .arg(file)
                .stdout_to(&tmp)
                .env(VALUE_VAR, &envfile::quote_value(value)),
        )
        .and(ShellCommand::new("cat").arg(&tmp).stdout_to(file))
        .and(ShellCommand::new("rm").arg("-f").arg(&tmp))
        .in_dir(dir)
}

/// Copy the `key` line(s) of `env_file` into a private backup file.
///
/// The value never travels through the command line.
pub fn backup_env_value(dir: &str, env_file: &str, key: &EnvKey, backup_file: &str) -> ShellCommand {
    let tmp = tmp_path(backup_file);
    let parent = Path::new(backup_file)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string());

    ShellCommand::new("umask 077")
        .and(ShellCommand::new("mkdir").arg("-p").arg(parent))
        .and(
            ShellCommand::new("grep")
                .arg("-E")
                .arg(key_pattern(key))
                .arg(env_file)
                .stdout_to(&tmp),
        )
        .and(ShellCommand::new("mv").arg("-f").arg(&tmp).arg(backup_file))
        .in_dir(dir)
}

/// Fetch and hard-reset the working tree, echoing the revision before and after.
///
/// A failed fetch never reaches the reset.
pub fn git_sync(dir: &str, remote: &str, branch: &str) -> ShellCommand {
    let target = format!("{}/{}", remote, branch);
    ShellCommand::new("git")
        .arg("rev-parse")
        .arg("HEAD")
        .and(
            ShellCommand::new("git")
                .arg("fetch")
                .arg("--quiet")
                .arg(remote)
                .arg(branch),
        )
        .and(
            ShellCommand::new("git")
                .arg("reset")
                .arg("--hard")
                .arg("--quiet")
                .arg(target),
        )
        .and(ShellCommand::new("git").arg("rev-parse").arg("HEAD"))
        .in_dir(dir)
}

fn compose(compose_file: Option<&str>) -> ShellCommand {
    let cmd = ShellCommand::new("docker compose");
    match compose_file {
        Some(file) => cmd.arg("-f").arg(file),
        None => cmd,
    }
}

/// Rebuild the service image and recreate its container so it rereads the env file.
pub fn compose_rebuild(dir: &str, compose_file: Option<&str>, service: &str) -> ShellCommand {
    compose(compose_file)
        .arg("build")
        .arg(service)
        .and(
            compose(compose_file)
                .arg("up")
                .arg("-d")
                .arg("--force-recreate")
                .arg(service),
        )
        .in_dir(dir)
}

/// Run the migration command inside the running service.
pub fn compose_migrate(
    dir: &str,
    compose_file: Option<&str>,
    service: &str,
    command: &str,
) -> ShellCommand {
    compose(compose_file)
        .arg("exec")
        .arg("-T")
        .arg(service)
        .arg("sh")
        .arg("-c")
        .arg(command)
        .in_dir(dir)
}

/// GET `url` from the host; stdout is the body followed by a final status-code line.
pub fn http_probe(url: &str, timeout: Duration) -> ShellCommand {
    ShellCommand::new("curl")
        .arg("-sS")
        .arg("-m")
        .arg(timeout.as_secs().max(1).to_string())
        .arg("-w")
        .arg("\\n%{http_code}")
        .arg(url)
}

/// Where the running service can be queried for its environment.
#[derive(Debug, Clone, Copy)]
pub enum ServiceTarget<'a> {
    /// A named container (`docker exec`).
    Container(&'a str),
    /// A compose service in the app dir (`docker compose exec`).
    Compose {
        dir: &'a str,
        compose_file: Option<&'a str>,
        service: &'a str,
    },
}

/// Print the value of `key` as loaded by the running process.
pub fn service_env(target: ServiceTarget<'_>, key: &EnvKey) -> ShellCommand {
    match target {
        ServiceTarget::Container(name) => ShellCommand::new("docker")
            .arg("exec")
            .arg(name)
            .arg("printenv")
            .arg(key.as_str()),
        ServiceTarget::Compose {
            dir,
            compose_file,
            service,
        } => compose(compose_file)
            .arg("exec")
            .arg("-T")
            .arg(service)
            .arg("printenv")
            .arg(key.as_str())
            .in_dir(dir),
    }
}
