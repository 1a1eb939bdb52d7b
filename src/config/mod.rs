// ABOUTME: Configuration types and parsing for stevedore.yml.
// ABOUTME: Handles YAML parsing, file discovery, and validation of the deploy target.

mod app;
mod deserialize;
mod env_value;
mod health;
mod init;
mod secret;
mod server;

pub use app::AppConfig;
pub use env_value::EnvValue;
pub use health::HealthConfig;
pub use init::init_config;
pub use secret::SecretConfig;
pub use server::ServerConfig;

use crate::error::{Error, Result};
use crate::types::ServiceName;
use deserialize::deserialize_server;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stevedore.yml";
pub const CONFIG_FILENAME_ALT: &str = "stevedore.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stevedore/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceName,

    #[serde(deserialize_with = "deserialize_server")]
    pub server: ServerConfig,

    pub app: AppConfig,

    #[serde(default)]
    pub secret: SecretConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Command run inside the compose service.
    #[serde(default = "default_migration_command")]
    pub command: String,

    /// Stderr substrings that mark a hard failure despite the tolerant policy.
    #[serde(default)]
    pub hard_failure_markers: Vec<String>,
}

fn default_migration_command() -> String {
    "npm run db:migrate".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            command: default_migration_command(),
            hard_failure_markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_enabled")]
    pub enabled: bool,

    #[serde(default = "default_stale_after", with = "humantime_serde")]
    pub stale_after: Duration,
}

fn default_lock_enabled() -> bool {
    true
}

fn default_stale_after() -> Duration {
    Duration::from_secs(3600)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: default_lock_enabled(),
            stale_after: default_stale_after(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.app.dir.trim().is_empty() {
            return Err(Error::InvalidConfig("app.dir cannot be empty".to_string()));
        }
        if self.app.compose_service.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "app.compose_service cannot be empty".to_string(),
            ));
        }
        if self.health.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "health.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.health.expect_body.is_none() && self.health.expect_status.is_none() {
            return Err(Error::InvalidConfig(
                "health needs expect_body or expect_status".to_string(),
            ));
        }
        if self.secret.min_length == 0 {
            return Err(Error::InvalidConfig(
                "secret.min_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn template() -> Self {
        Config {
            service: ServiceName::new("my-app").expect("template service name is valid"),
            server: ServerConfig::parse("deploy@server.example.com")
                .expect("template server address is valid"),
            app: AppConfig {
                dir: "/srv/my-app".to_string(),
                remote: "origin".to_string(),
                branch: "main".to_string(),
                compose_file: None,
                compose_service: "backend".to_string(),
                container: None,
                settle: Duration::from_secs(10),
            },
            secret: SecretConfig::default(),
            migration: MigrationConfig::default(),
            health: HealthConfig::default(),
            lock: LockConfig::default(),
        }
    }
}
