// =============================================================================
// Aurora Desk — Main Entry Point
// =============================================================================
//
// Boots the simulated exchange desk: seeds price history, starts the random
// walk feed and the settlement loop, and serves the REST API until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod balance_store;
mod crypto;
mod deposit;
mod exchange;
mod history;
mod indicators;
mod market_data;
mod mining;
mod navigation;
mod options;
mod runtime_config;
mod session;
mod transaction_pin;
mod types;
mod withdrawal;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

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
    info!("║        Aurora Desk — Starting Up                         ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(syms) = std::env::var("AURORA_DESK_SYMBOLS") {
        config.apply_symbol_override(&syms);
    }

    if std::env::var(api::auth::TOKEN_ENV).unwrap_or_default().is_empty() {
        warn!(
            "{} is not set; authenticated endpoints will reject every request",
            api::auth::TOKEN_ENV
        );
    }

    info!(
        assets = config.assets.len(),
        feed_symbols = ?config.feed_symbols,
        interval = %config.candle_interval,
        "Desk configured"
    );

    let tick_every = std::time::Duration::from_millis(config.tick_interval_ms.max(100));
    let settle_every = std::time::Duration::from_millis(config.settlement_interval_ms.max(100));
    let seed_candles = config.seed_candles;

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Seed chart history ────────────────────────────────────────────
    {
        let mut rng = rand::rng();
        state.feed.seed_history(
            &mut rng,
            state.store.as_ref(),
            &state.candle_buffer,
            Utc::now().timestamp(),
            seed_candles,
        );
    }

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("AURORA_DESK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        info!(addr = %bind_addr, "API server listening");
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Simulated price feed ──────────────────────────────────────────
    let feed_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_every);
        loop {
            interval.tick().await;
            feed_state.tick_feed(Utc::now().timestamp());
        }
    });

    // ── 6. Options / mining settlement ───────────────────────────────────
    let settle_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(settle_every);
        loop {
            interval.tick().await;
            let settled = settle_state.settle_due(Utc::now().timestamp());
            if settled > 0 {
                info!(settled, "settlement pass complete");
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Aurora Desk shut down complete.");
    Ok(())
}
