use super::run::abort_on_shutdown;
use super::utils::load_service;
use clawd_daemon::CancellationToken;
use clawd_types::ClawdResult;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Foreground entry of the supervised executable. Runs until a shutdown
/// signal arrives, logging a heartbeat.
pub async fn run_gateway(workspace: &Path, config_path: &Path) -> ClawdResult<()> {
    let config = super::utils::load_config(config_path)?;
    let heartbeat = Duration::from_secs(config.gateway.heartbeat_secs.max(1));
    let service = Arc::new(load_service(workspace, config_path, &[])?);
    abort_on_shutdown(service.clone());

    service
        .run(|token| async move { host(token, heartbeat).await })
        .await?;

    info!("Gateway shut down");
    Ok(())
}

async fn host(token: CancellationToken, heartbeat: Duration) -> ClawdResult<()> {
    let started = Instant::now();
    info!("Gateway running (PID {})", std::process::id());

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!("Gateway heartbeat, up {:?}", started.elapsed());
            }
            _ = token.cancelled() => return Ok(()),
        }
    }
}
