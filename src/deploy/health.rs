// ABOUTME: Bounded health polling and the running-service secret check.
// ABOUTME: Probes are issued from the host over the shell, one at a time.

use std::time::Duration;

use crate::config::{AppConfig, HealthConfig};
use crate::shell::Shell;
use crate::ssh;
use crate::types::EnvKey;

use super::commands::{self, ServiceTarget};
use super::secret::{SecretPolicy, SecretValue};

/// Conditions a probe response must meet. Every condition present must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthExpectation {
    pub body: Option<String>,
    pub status: Option<u16>,
}

impl HealthExpectation {
    pub fn is_satisfied_by(&self, response: &ProbeResponse) -> bool {
        if response.exit_code != 0 {
            return false;
        }
        if let Some(status) = self.status
            && response.status != Some(status)
        {
            return false;
        }
        if let Some(token) = &self.body
            && !response.body.contains(token.as_str())
        {
            return false;
        }
        true
    }
}

/// One probe's result as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub exit_code: u32,
    pub status: Option<u16>,
    pub body: String,
    pub stderr: String,
}

impl ProbeResponse {
    /// Split curl output into body and the trailing status-code line.
    pub fn parse(output: &ssh::CommandOutput) -> Self {
        let (body, status) = match output.stdout.rsplit_once('\n') {
            Some((body, code)) => (body.to_string(), code.trim().parse().ok()),
            None => (String::new(), output.stdout.trim().parse().ok()),
        };
        Self {
            exit_code: output.exit_code,
            // curl reports 000 when no response arrived
            status: status.filter(|s| *s != 0),
            body,
            stderr: output.stderr.clone(),
        }
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("HTTP {}: {}", status, self.body.trim()),
            None if self.stderr.trim().is_empty() => format!("no response (exit {})", self.exit_code),
            None => format!("no response: {}", self.stderr.trim()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthOutcome {
    pub healthy: bool,
    pub attempts: u32,
    pub last_response: Option<ProbeResponse>,
}

impl HealthOutcome {
    pub fn detail(&self) -> String {
        let last = self
            .last_response
            .as_ref()
            .map(ProbeResponse::describe)
            .unwrap_or_else(|| "no probe ran".to_string());
        if self.healthy {
            format!("healthy after {} attempt(s): {}", self.attempts, last)
        } else {
            format!("unhealthy after {} attempt(s); last: {}", self.attempts, last)
        }
    }
}

/// Polls the health endpoint until it passes or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct HealthGate {
    url: String,
    expect: HealthExpectation,
    max_attempts: u32,
    interval: Duration,
    request_timeout: Duration,
}

impl HealthGate {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            url: config.url.clone(),
            expect: HealthExpectation {
                body: config.expect_body.clone(),
                status: config.expect_status,
            },
            max_attempts: config.max_attempts.max(1),
            interval: config.interval,
            request_timeout: config.request_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Probe serially, sleeping `interval` between attempts but not after the last.
    ///
    /// Returns on the first satisfying response. Transport errors end polling.
    pub async fn poll<S: Shell + ?Sized>(&self, shell: &S) -> ssh::Result<HealthOutcome> {
        let command = commands::http_probe(&self.url, self.request_timeout);
        let mut last_response = None;

        for attempt in 1..=self.max_attempts {
            let output = shell.exec(command.as_str()).await?;
            let response = ProbeResponse::parse(&output);

            if self.expect.is_satisfied_by(&response) {
                tracing::info!("Health check passed on attempt {}/{}", attempt, self.max_attempts);
                return Ok(HealthOutcome {
                    healthy: true,
                    attempts: attempt,
                    last_response: Some(response),
                });
            }

            tracing::debug!(
                "Health attempt {}/{} not satisfied: {}",
                attempt,
                self.max_attempts,
                response.describe()
            );
            last_response = Some(response);

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        tracing::warn!("Health check failed after {} attempts", self.max_attempts);
        Ok(HealthOutcome {
            healthy: false,
            attempts: self.max_attempts,
            last_response,
        })
    }
}

/// Asks the running service which secret it actually loaded.
#[derive(Debug, Clone)]
pub struct LiveSecretProbe {
    key: EnvKey,
    dir: String,
    compose_file: Option<String>,
    compose_service: String,
    container: Option<String>,
}

/// Verdict of [`LiveSecretProbe::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveSecret {
    Matches,
    /// The process carries a different value, or an unusable one.
    Mismatch(String),
    /// The process could not be queried.
    Unavailable(String),
}

impl LiveSecretProbe {
    pub fn new(app: &AppConfig, key: EnvKey) -> Self {
        Self {
            key,
            dir: app.dir.clone(),
            compose_file: app.compose_file.clone(),
            compose_service: app.compose_service.clone(),
            container: app.container.clone(),
        }
    }

    fn target(&self) -> ServiceTarget<'_> {
        match &self.container {
            Some(name) => ServiceTarget::Container(name),
            None => ServiceTarget::Compose {
                dir: &self.dir,
                compose_file: self.compose_file.as_deref(),
                service: &self.compose_service,
            },
        }
    }

    pub async fn verify<S: Shell + ?Sized>(
        &self,
        shell: &S,
        expected: &SecretValue,
        policy: &SecretPolicy,
    ) -> ssh::Result<LiveSecret> {
        let output = shell
            .exec(commands::service_env(self.target(), &self.key).as_str())
            .await?;

        if !output.success() {
            return Ok(LiveSecret::Unavailable(format!(
                "could not read {} from the running service (exit {}): {}",
                self.key,
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let loaded = output.stdout.trim_end_matches(['\n', '\r']);
        if let Err(defect) = policy.check(Some(loaded)) {
            return Ok(LiveSecret::Mismatch(format!(
                "running service's {} is {}",
                self.key, defect
            )));
        }
        if loaded != expected.expose() {
            return Ok(LiveSecret::Mismatch(format!(
                "running service's {} differs from the configured value",
                self.key
            )));
        }
        Ok(LiveSecret::Matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::CommandOutput;

    #[test]
    fn parses_body_and_status() {
        let response = ProbeResponse::parse(&CommandOutput::new(0, "{\"status\":\"healthy\"}\n200", ""));
        assert_eq!(response.status, Some(200));
        assert_eq!(response.body, "{\"status\":\"healthy\"}");
    }

    #[test]
    fn refused_connection_has_no_status() {
        let response = ProbeResponse::parse(&CommandOutput::new(
            7,
            "\n000",
            "curl: (7) Failed to connect to 127.0.0.1 port 3000",
        ));
        assert_eq!(response.status, None);
        assert!(response.describe().contains("Failed to connect"));
    }

    #[test]
    fn every_present_condition_must_hold() {
        let expect = HealthExpectation {
            body: Some("healthy".into()),
            status: Some(200),
        };
        let ok = ProbeResponse::parse(&CommandOutput::new(0, "healthy\n200", ""));
        let wrong_status = ProbeResponse::parse(&CommandOutput::new(0, "healthy\n503", ""));
        let wrong_body = ProbeResponse::parse(&CommandOutput::new(0, "starting\n200", ""));
        assert!(expect.is_satisfied_by(&ok));
        assert!(!expect.is_satisfied_by(&wrong_status));
        assert!(!expect.is_satisfied_by(&wrong_body));
    }

    #[test]
    fn body_only_expectation_ignores_status() {
        let expect = HealthExpectation {
            body: Some(r#""status":"healthy""#.into()),
            status: None,
        };
        let healthy = ProbeResponse::parse(&CommandOutput::new(0, "{\"status\":\"healthy\"}\n503", ""));
        let unhealthy =
            ProbeResponse::parse(&CommandOutput::new(0, "{\"status\":\"unhealthy\"}\n200", ""));
        assert!(expect.is_satisfied_by(&healthy));
        assert!(!expect.is_satisfied_by(&unhealthy));
    }
}
