// ABOUTME: Settings for the protected configuration value.
// ABOUTME: Names the key, where it lives, where it is backed up, and what counts as a placeholder.

use crate::types::EnvKey;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    #[serde(default = "default_key")]
    pub key: EnvKey,

    /// Live configuration file (relative to the app dir unless absolute).
    #[serde(default = "default_env_file")]
    pub env_file: String,

    #[serde(default)]
    pub backup_file: Option<String>,

    /// Secondary configuration source consulted when the backup is unusable.
    #[serde(default)]
    pub fallback_file: Option<String>,

    /// Case-insensitive substrings marking a development or template value.
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,

    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

fn default_key() -> EnvKey {
    EnvKey::new("JWT_SECRET").expect("JWT_SECRET is a valid key")
}

fn default_env_file() -> String {
    ".env".to_string()
}

fn default_placeholders() -> Vec<String> {
    [
        "dev-secret",
        "not-for-production",
        "your_jwt_secret",
        "your-secret",
        "change_me",
        "changeme",
        "placeholder",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_min_length() -> usize {
    32
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            env_file: default_env_file(),
            backup_file: None,
            fallback_file: None,
            placeholders: default_placeholders(),
            min_length: default_min_length(),
        }
    }
}

impl SecretConfig {
    /// Durable backup location, `.stevedore/<KEY>.backup` by default.
    pub fn backup_path(&self) -> String {
        self.backup_file
            .clone()
            .unwrap_or_else(|| format!(".stevedore/{}.backup", self.key))
    }
}
