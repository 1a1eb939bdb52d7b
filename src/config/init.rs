// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented stevedore.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::template());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"service: {service}
server:
  host: {host}
  port: {port}
  user: {user}
  # key_path: ~/.ssh/deploy_ed25519
  # password: {{ env: STEVEDORE_SSH_PASSWORD }}
  # Accept and remember an unknown host key on first connection
  # trust_first_connection: true
app:
  dir: {dir}
  remote: {remote}
  branch: {branch}
  compose_service: {compose_service}
  settle: 10s
secret:
  key: {key}
  env_file: {env_file}
  # fallback_file: /root/secrets/{service}.env
migration:
  command: {migration}
health:
  url: {url}
  expect_body: '"status":"healthy"'
  max_attempts: {attempts}
  interval: 5s
"#,
        service = config.service,
        host = config.server.host,
        port = config.server.port,
        user = config.server.user.as_deref().unwrap_or("deploy"),
        dir = config.app.dir,
        remote = config.app.remote,
        branch = config.app.branch,
        compose_service = config.app.compose_service,
        key = config.secret.key,
        env_file = config.secret.env_file,
        migration = config.migration.command,
        url = config.health.url,
        attempts = config.health.max_attempts,
    )
}
