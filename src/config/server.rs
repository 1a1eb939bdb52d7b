// ABOUTME: Target host configuration for the SSH session.
// ABOUTME: Parses formats like "host", "user@host", "host:port", "user@host:port".

use super::EnvValue;
use crate::error::Result;
use crate::ssh::SessionConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Password credential. Prefer `{ env: VAR }` over a literal.
    #[serde(default)]
    pub password: Option<EnvValue>,
    #[serde(default)]
    pub trust_first_connection: bool,
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl ServerConfig {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(ServerConfig {
            host: host.to_string(),
            port,
            user: user_part.filter(|u| !u.is_empty()).map(str::to_string),
            key_path: None,
            password: None,
            trust_first_connection: false,
            known_hosts_path: None,
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
        })
    }

    /// Login user, falling back to `$USER` and then `root`.
    pub fn login_user(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| std::env::var("USER").unwrap_or_else(|_| "root".to_string()))
    }

    /// Build the SSH session configuration, resolving env-backed credentials.
    pub fn ssh_session_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::new(&self.host, self.login_user())
            .port(self.port)
            .trust_on_first_use(self.trust_first_connection)
            .connect_timeout(self.connect_timeout)
            .command_timeout(self.command_timeout);

        if let Some(path) = &self.known_hosts_path {
            config = config.known_hosts_path(path);
        }

        if let Some(password) = &self.password {
            config = config.password(password.resolve()?);
        } else if let Some(key_path) = &self.key_path {
            config = config.key_path(key_path);
        }

        Ok(config)
    }
}
