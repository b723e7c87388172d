// =============================================================================
// TradingView Moving-Average Bot — Main Entry Point
// =============================================================================
//
// Single run-to-completion process: connect, subscribe to one instrument,
// wait for candles, print the SMA(10)/SMA(50) crossover report, disconnect.
// If the full analysis fails, a reduced flow tries to fetch the last price.
// The process exits successfully either way.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod error;
mod feed;
mod indicators;
mod market_data;
mod pipeline;
mod poller;
mod report;
mod resolver;
mod runtime_config;
mod session;
mod types;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::feed::tradingview::TradingViewFeed;
use crate::pipeline::RunOutcome;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "tvbot_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    // Logs go to stderr; stdout carries only the report.
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting TradingView moving-average bot");

    // ── 2. Config ────────────────────────────────────────────────────────
    let config_path =
        std::env::var("TVBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());

    info!(
        primary = %config.primary_symbol,
        candidates = ?config.symbol_candidates,
        timeframe = %config.timeframe,
        "Configured instrument"
    );

    // ── 3. Run primary flow, falling back to the simple flow ─────────────
    let mut out = std::io::stdout();
    let outcome = pipeline::run(|| TradingViewFeed::from_config(&config), &config, &mut out).await;

    match outcome {
        RunOutcome::Primary(report) => info!(
            symbol = %report.resolved.symbol,
            signal = %report.analysis.signal,
            "Bot finished"
        ),
        RunOutcome::Simple { last_price } => {
            info!(last_price = ?last_price, "Bot finished with simple approach")
        }
        RunOutcome::Failed => warn!("Bot finished without data"),
    }

    Ok(())
}
