// ABOUTME: Configuration key names for line-oriented KEY=value files.
// ABOUTME: Restricted to shell variable syntax so keys are safe in grep patterns and env prefixes.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvKeyError {
    #[error("config key cannot be empty")]
    Empty,

    #[error("config key cannot start with a digit")]
    StartsWithDigit,

    #[error("invalid character in config key: '{0}'")]
    InvalidChar(char),
}

/// A key in a `KEY=value` file, e.g. `JWT_SECRET`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EnvKey(String);

impl EnvKey {
    pub fn new(value: &str) -> Result<Self, EnvKeyError> {
        let first = value.chars().next().ok_or(EnvKeyError::Empty)?;
        if first.is_ascii_digit() {
            return Err(EnvKeyError::StartsWithDigit);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_')
        {
            return Err(EnvKeyError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EnvKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EnvKey::new(&s).map_err(serde::de::Error::custom)
    }
}
