// ABOUTME: Post-restart health probe configuration.
// ABOUTME: Bounded attempts at a fixed interval against a loopback HTTP endpoint.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Literal token the response body must contain.
    #[serde(default = "default_expect_body")]
    pub expect_body: Option<String>,

    /// Exact status code the response must carry.
    #[serde(default)]
    pub expect_status: Option<u16>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_url() -> String {
    "http://127.0.0.1:3000/health".to_string()
}

fn default_expect_body() -> Option<String> {
    Some(r#""status":"healthy""#.to_string())
}

fn default_max_attempts() -> u32 {
    6
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            expect_body: default_expect_body(),
            expect_status: None,
            max_attempts: default_max_attempts(),
            interval: default_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}
