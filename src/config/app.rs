// ABOUTME: Remote application layout: working tree, git reference, compose service.
// ABOUTME: Everything the sync, rebuild and migration steps need to address the app.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Working tree on the remote host. Relative paths below resolve against it.
    pub dir: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default)]
    pub compose_file: Option<String>,

    /// Compose service that is rebuilt, restarted and used for `exec`.
    pub compose_service: String,

    /// Running container name. When unset, the compose service is used instead.
    #[serde(default)]
    pub container: Option<String>,

    /// Pause after restart before running the migration.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_settle() -> Duration {
    Duration::from_secs(10)
}

impl AppConfig {
    /// The remote-tracking reference the working tree is reset to.
    pub fn reset_target(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}
