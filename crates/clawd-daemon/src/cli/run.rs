use clawd_daemon::Service;
use std::sync::Arc;
use tracing::{error, info};

/// Waits for SIGTERM, SIGINT or SIGHUP (Ctrl+C elsewhere).
pub async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
        };
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}

/// Aborts `service` when the process receives a shutdown signal.
pub fn abort_on_shutdown(service: Arc<Service>) {
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!("Received {}", signal);
                service.abort();
            }
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    });
}
