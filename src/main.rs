// =============================================================================
// Chart Feed: Main Entry Point
// =============================================================================
//
// Wires the feed controller, the trade journal poller and the renderer API
// together. The controller starts on the configured selection; everything
// after that is driven through the API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod chart;
mod feed;
mod indicators;
mod market_data;
mod runtime_config;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::ChartState;
use crate::feed::{FeedController, FeedEvent, LiveTransport, MarketClient};
use crate::runtime_config::ChartConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Chart Feed: Starting Up                           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("CHART_CONFIG").unwrap_or_else(|_| "chart_config.json".into());

    let mut config = ChartConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ChartConfig::default()
    });
    config.apply_env_overrides();

    let selection = config.initial_selection();
    let ws_base = config.resolved_ws_url();
    info!(
        api_url = %config.api_url,
        ws_url = %ws_base,
        selection = %selection,
        "Chart feed configured"
    );

    // ── 2. Shared state & controller ─────────────────────────────────────
    let (events, inbox) = tokio::sync::mpsc::unbounded_channel();
    let state = Arc::new(ChartState::new(
        events.clone(),
        config.exchange.clone(),
        config.indicators,
    ));

    let client = MarketClient::new(config.api_url.clone())?;
    let transport = LiveTransport::new(client.clone(), ws_base, config.snapshot_limit);
    let controller = FeedController::new(transport, events.clone(), state.clone(), &config);
    let controller_task = tokio::spawn(controller.run(inbox));

    events
        .send(FeedEvent::Select(selection))
        .context("feed controller exited before start")?;

    // ── 3. Trade journal poller ──────────────────────────────────────────
    let poll_interval = Duration::from_secs(config.trade_poll_secs.max(1));
    let poller_task = tokio::spawn(feed::trades::run_trade_poller(
        client,
        poll_interval,
        events.clone(),
    ));

    // ── 4. Start the API server ──────────────────────────────────────────
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

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = events.send(FeedEvent::Shutdown);
    if let Err(e) = controller_task.await {
        error!(error = %e, "feed controller task failed");
    }
    poller_task.abort();

    // Remember where the user left off.
    if let Some(selection) = state.status().selection {
        config.exchange = selection.exchange;
        config.symbol = selection.symbol;
        config.timeframe = selection.timeframe;
    }
    config.indicators = state.indicators();
    if let Err(e) = config.save(&config_path) {
        error!(error = %e, "Failed to save chart config on shutdown");
    }

    info!("Chart feed shut down complete.");
    Ok(())
}
