//! `linkdrop` entry point.

use linkdrop_bot::poller::run_poller;
use linkdrop_bot::{BotConfig, bootstrap, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::load();
    let _log_guard = init_tracing(config.log_dir.as_deref());

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "linkdrop starting");
    let runtime = bootstrap(&config).await?;

    let shutdown = runtime.shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    run_poller(&runtime.client, runtime.context.clone(), config.poll_timeout()).await;

    if !runtime.supervisor.shutdown(config.shutdown_grace()).await {
        tracing::warn!("Some tasks did not stop within the shutdown grace period");
    }
    tracing::info!("linkdrop stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM from a service manager.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Interrupt received, shutting down"),
                    _ = term.recv() => tracing::info!("SIGTERM received, shutting down"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received, shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
