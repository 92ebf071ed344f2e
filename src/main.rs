// =============================================================================
// FX Chart Feed — Main Entry Point
// =============================================================================
//
// Starts one chart session with the configured default selection, streams
// live quotes into it, and serves the dashboard API until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod chart;
mod error;
mod market_data;
mod runtime_config;
mod session;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{HistoryClient, WsTransport};
use crate::runtime_config::RuntimeConfig;
use crate::session::{run_controller, ControlCommand, StreamSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("FX chart feed starting up");

    let mut config = RuntimeConfig::load("runtime_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate().context("invalid runtime configuration")?;

    info!(
        ws_endpoint = ?config.ws_endpoint,
        history_endpoint = ?config.history_endpoint,
        selection = %config.initial_selection(),
        max_candles = config.max_candles,
        "configuration ready"
    );

    // ── 2. Shared state & channels ───────────────────────────────────────
    let (command_tx, command_rx) = mpsc::channel::<ControlCommand>(32);
    let (event_tx, event_rx) = mpsc::channel(1024);
    let state = Arc::new(AppState::new(config.clone(), command_tx));

    // ── 3. Session controller ────────────────────────────────────────────
    let session = StreamSession::new(
        config.ws_endpoint.clone(),
        config.initial_selection(),
        config.max_candles,
        state.chart.clone(),
        WsTransport::new(event_tx),
    );
    let history = HistoryClient::new(
        config.history_endpoint.clone(),
        Duration::from_secs(config.history_timeout_secs),
    )?;
    let controller = tokio::spawn(run_controller(
        state.clone(),
        session,
        history,
        command_rx,
        event_rx,
    ));

    // ── 4. Dashboard API ─────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("Feed running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if state.commands.send(ControlCommand::Shutdown).await.is_err() {
        warn!("session controller already stopped");
    }
    if let Err(e) = controller.await {
        error!(error = %e, "session controller task failed");
    }

    info!("FX chart feed shut down complete.");
    Ok(())
}
