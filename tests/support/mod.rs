// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory shell and a sample service configuration.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Once};
use stevedore::config::Config;
use stevedore::deploy::commands;
use stevedore::shell::Shell;
use stevedore::ssh::{self, CommandOutput};
use stevedore::types::EnvKey;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("stevedore=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const APP_DIR: &str = "/srv/api";
pub const FALLBACK_FILE: &str = "/root/secrets/api.env";
pub const BACKUP_FILE: &str = ".stevedore/JWT_SECRET.backup";
pub const GOOD_SECRET: &str = "Jx8v2Qm9LrT4wZk1Np7Hc3Yd6Fs0Gb5Ae";
pub const OTHER_SECRET: &str = "q7Rk2Lm0Vx9Tz4Nb8Wc1Hd5Jf3Gs6Yp2U";
pub const PLACEHOLDER: &str = "dev-secret-api-not-for-production-0123456789";

pub const CONFIG_YAML: &str = r#"
service: api
server: deploy@10.0.0.5
app:
  dir: /srv/api
  compose_service: backend
  settle: 10s
secret:
  fallback_file: /root/secrets/api.env
migration:
  hard_failure_markers: ["ECONNREFUSED"]
health:
  max_attempts: 6
  interval: 5s
"#;

pub fn config() -> Config {
    Config::from_yaml(CONFIG_YAML).unwrap()
}

pub fn key() -> EnvKey {
    EnvKey::new("JWT_SECRET").unwrap()
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput::new(0, stdout, "")
}

pub fn exit(code: u32, stderr: &str) -> CommandOutput {
    CommandOutput::new(code, "", stderr)
}

/// The exact command that reads the key from `file`.
pub fn read(file: &str) -> String {
    commands::read_env_value(APP_DIR, file, &key()).into_string()
}

pub const LIVE_FILE: &str = ".env";

pub const BACKUP_WRITE: &str = "mv -f";
pub const LIVE_WRITE: &str = "awk";
pub const SYNC: &str = "git fetch";
pub const REBUILD: &str = "up -d --force-recreate";
pub const MIGRATE: &str = "db:migrate";
pub const PROBE: &str = "curl";
pub const SERVICE_ENV: &str = "printenv";

/// grep output for one assignment line.
pub fn env_line(value: &str) -> CommandOutput {
    ok(&format!("JWT_SECRET={}\n", value))
}

/// grep found nothing.
pub fn absent() -> CommandOutput {
    exit(1, "")
}

#[derive(Clone)]
pub enum Reply {
    Output(CommandOutput),
    /// Answers after the given (tokio) delay.
    Slow(std::time::Duration, CommandOutput),
    Transport,
    Panic,
}

struct Rule {
    needle: String,
    exact: bool,
    replies: VecDeque<Reply>,
    last: Reply,
}

impl Rule {
    fn matches(&self, command: &str) -> bool {
        if self.exact {
            command == self.needle
        } else {
            command.contains(&self.needle)
        }
    }

    fn next(&mut self) -> Reply {
        self.replies.pop_front().unwrap_or_else(|| self.last.clone())
    }
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    log: Vec<String>,
    closes: usize,
}

/// A scripted host. Exact rules are checked before substring rules, and a
/// later rule shadows an earlier one. Each rule replays its queue and then
/// repeats the final reply. Commands no rule matches exit 127.
#[derive(Clone, Default)]
pub struct FakeShell {
    state: Arc<Mutex<State>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, needle: impl Into<String>, exact: bool, replies: Vec<Reply>) -> &Self {
        let mut replies: VecDeque<Reply> = replies.into();
        let last = replies
            .pop_back()
            .expect("a rule needs at least one reply");
        self.state.lock().rules.push(Rule {
            needle: needle.into(),
            exact,
            replies,
            last,
        });
        self
    }

    /// Answer commands equal to `command`.
    pub fn on_exact(&self, command: impl Into<String>, outputs: Vec<CommandOutput>) -> &Self {
        self.add(command, true, outputs.into_iter().map(Reply::Output).collect())
    }

    /// Answer commands containing `needle`.
    pub fn on(&self, needle: impl Into<String>, outputs: Vec<CommandOutput>) -> &Self {
        self.add(needle, false, outputs.into_iter().map(Reply::Output).collect())
    }

    pub fn on_replies(&self, needle: impl Into<String>, replies: Vec<Reply>) -> &Self {
        self.add(needle, false, replies)
    }

    /// Lock directory, acquire, release: all succeed.
    pub fn with_free_lock(&self) -> &Self {
        self.on(".local/state/stevedore", vec![ok("")])
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// How many executed commands contain `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }

    /// Index of the first executed command containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.state.lock().log.iter().position(|c| c.contains(needle))
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

#[async_trait]
impl Shell for FakeShell {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        let reply = {
            let mut state = self.state.lock();
            state.log.push(command.to_string());
            let index = state
                .rules
                .iter()
                .rposition(|r| r.exact && r.matches(command))
                .or_else(|| state.rules.iter().rposition(|r| r.matches(command)));
            match index {
                Some(i) => state.rules[i].next(),
                None => Reply::Output(exit(127, "sh: command not found")),
            }
        };

        match reply {
            Reply::Output(output) => Ok(output),
            Reply::Slow(delay, output) => {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
            Reply::Transport => Err(ssh::Error::ChannelClosed),
            Reply::Panic => panic!("scripted panic for {}", command),
        }
    }

    async fn close(&self) -> ssh::Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }
}

/// A host where every step of a deployment goes right. The migration prints a
/// benign notice on stderr.
pub fn happy_host() -> FakeShell {
    let shell = FakeShell::new();
    shell
        .with_free_lock()
        .on_exact(read(LIVE_FILE), vec![env_line(GOOD_SECRET)])
        .on(BACKUP_WRITE, vec![ok("")])
        .on(SYNC, vec![ok("1111111aaaaaaa\n2222222bbbbbbb\n")])
        .on(REBUILD, vec![ok("")])
        .on(
            MIGRATE,
            vec![CommandOutput::new(0, "", "npm notice New major version of npm available")],
        )
        .on(PROBE, vec![ok("{\"status\":\"healthy\"}\n200")])
        .on(SERVICE_ENV, vec![ok(&format!("{}\n", GOOD_SECRET))]);
    shell
}
