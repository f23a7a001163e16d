// src/server/mod.rs

use crate::config::Config;
use crate::connection::TlsDialer;
use crate::core::leaderboard::speedrun::SpeedrunCom;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::info;

mod metrics_server;
pub mod session;

pub use metrics_server::run_metrics_server;
pub use session::{Phase, Session};

/// Builds the session from `config` and runs it until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let credential = config.load_credential()?;
    let leaderboard = Arc::new(SpeedrunCom::new(config.leaderboard.clone())?);
    let dialer = TlsDialer::new(
        &config.host,
        config.port,
        config.tls,
        config.timing.connect_timeout,
    );

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    let (shutdown_tx, session_rx) = broadcast::channel(1);

    let metrics_task = config.metrics.enabled.then(|| {
        tokio::spawn(run_metrics_server(
            config.metrics.port,
            shutdown_tx.subscribe(),
        ))
    });

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
        let _ = signal_tx.send(());
    });

    info!(
        "Relay {} starting for #{} ({} channels).",
        config.bot_name,
        config.home_channel,
        config.channels_to_join().len()
    );
    let mut session = Session::new(&config, dialer, credential, leaderboard);
    session.run(session_rx).await;

    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    info!("Relay shutdown complete.");
    Ok(())
}
