use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warden::Supervisor;
use warden::server::StatusServer;
use warden_core::SupervisorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "warden.json".to_string());
    let config = SupervisorConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    let supervisor = Supervisor::new(config.clone()).start().await?;
    let server = StatusServer::bind(&config.status_api, supervisor.state_cell()).await?;

    let shutdown = CancellationToken::new();
    let server_task = tokio::spawn(server.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    shutdown.cancel();
    if let Err(e) = supervisor.shutdown().await {
        error!(error = %e, "supervisor shutdown failed");
    }
    server_task.await.context("status server task panicked")??;

    Ok(())
}
