// ABOUTME: Deploy, check and plan command implementations.
// ABOUTME: Connects the SSH session, hands it to the orchestrator and renders the report.

use stevedore::config::Config;
use stevedore::deploy::{DeploymentReport, Orchestrator};
use stevedore::error::{Error, Result};
use stevedore::output::Output;
use stevedore::ssh::Session;

/// Resolves when the user presses Ctrl-C.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn connect(config: &Config, output: &Output) -> Result<Session> {
    output.progress(&format!("  → Connecting to {}...", config.server.host));
    let session = Session::connect(config.server.ssh_session_config()?).await?;
    Ok(session)
}

fn verdict(report: &DeploymentReport, output: &Output) -> Result<()> {
    output.report(report);
    if report.success {
        Ok(())
    } else {
        Err(Error::DeploymentFailed(report.service.clone()))
    }
}

/// Run the full deployment sequence against the configured server.
pub async fn deploy(config: Config, force: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Deploying {} ({}) to {}",
        config.service,
        config.app.reset_target(),
        config.server.host
    ));

    let orchestrator = Orchestrator::new(config).force_lock(force);
    let session = connect(orchestrator.config(), &output).await?;

    let report = orchestrator
        .run(&session, interrupted(), |result| output.step(result))
        .await;
    verdict(&report, &output)
}

/// Probe the running service without changing it.
pub async fn check(config: Config, mut output: Output) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Checking {} on {}", config.service, config.server.host));

    let orchestrator = Orchestrator::new(config);
    let session = connect(orchestrator.config(), &output).await?;

    let report = orchestrator
        .check(&session, interrupted(), |result| output.step(result))
        .await;
    verdict(&report, &output)
}

/// Print the deployment steps without connecting.
pub fn plan(config: Config, output: Output) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    output.plan(&orchestrator.plan());
    Ok(())
}
