//! Runs one chunk server until interrupted.

use std::io::Write;

use filechunk_server::ChunkService;

use crate::config::Config;

/// Starts the service, prints the startup payload and waits for SIGINT.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let mut service = ChunkService::new();
    let info = service.start(&config.server).await;

    let line = serde_json::to_string(&info)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    drop(stdout);

    if !info.ready {
        anyhow::bail!("chunk server failed to start");
    }

    tracing::info!(base_url = %info.base_url, "agent ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("SIGINT received, shutting down");

    service.stop().await;
    Ok(())
}
