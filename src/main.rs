// =============================================================================
// Kline Pulse — Main Entry Point
// =============================================================================
//
// Wires the live kline feed into a bounded candle window and polls Heikin-Ashi
// views over it on a fixed interval until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod error;
mod indicators;
mod market_data;
mod runtime_config;
mod snapshot_publisher;
mod types;

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::indicators::SslPoint;
use crate::market_data::{CandleWindow, IngestionSession, WebSocketConnector};
use crate::runtime_config::RuntimeConfig;
use crate::snapshot_publisher::{ChartView, Overlay, SnapshotPublisher, View, ViewRequest};
use crate::types::IndicatorMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("KLINE_CONFIG").unwrap_or_else(|_| "runtime_config.json".into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(symbol) = std::env::var("KLINE_SYMBOL") {
        config.symbol = symbol.trim().to_lowercase();
    }
    if let Ok(interval) = std::env::var("KLINE_INTERVAL") {
        config.interval = interval.trim().to_string();
    }
    if let Ok(mode) = std::env::var("KLINE_MODE") {
        match mode.parse::<IndicatorMode>() {
            Ok(mode) => config.indicator_mode = mode,
            Err(e) => warn!(error = %e, "Ignoring KLINE_MODE"),
        }
    }
    config.validate()?;

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        capacity = config.capacity,
        mode = %config.indicator_mode,
        "Kline Pulse starting"
    );

    // ── 2. Candle window + ingestion ─────────────────────────────────────
    let window = Arc::new(CandleWindow::new(config.capacity));
    let ingestion =
        IngestionSession::new(config.session_config(), WebSocketConnector, window.clone())
            .spawn();

    // ── 3. View poller ───────────────────────────────────────────────────
    let publisher =
        SnapshotPublisher::new(window.clone(), config.ssl_params(), config.ema_params());
    let request = ViewRequest {
        symbol: config.symbol.clone(),
        timeframe: config.interval.clone(),
        requested_bars: config.requested_bars,
        mode: config.indicator_mode,
    };

    let mut interval = tokio::time::interval(config.poll_interval());
    let mut last_version: Option<u64> = None;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match publisher.get_view(&request) {
                    Ok(View::Waiting { title }) => {
                        if last_version.is_none() {
                            info!(title = %title, "Waiting for data...");
                            last_version = Some(0);
                        }
                    }
                    Ok(View::Ready(chart)) => {
                        if last_version != Some(chart.window_version) {
                            last_version = Some(chart.window_version);
                            log_chart(&chart);
                        }
                    }
                    Err(e) => error!(error = %e, "view request rejected"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for Ctrl+C");
                }
                break;
            }
        }
    }

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    warn!("Shutdown signal received — stopping gracefully");
    ingestion.shutdown().await;
    match window.snapshot(1).first() {
        Some(last) => info!(
            retained = window.len(),
            last_open = ?last.time(),
            last_close = last.close,
            "Final candle window"
        ),
        None => info!("No candles were received"),
    }
    info!("Kline Pulse shut down complete.");
    Ok(())
}

/// One summary line per new window version.
fn log_chart(chart: &ChartView) {
    let Some(last) = chart.candles.last() else {
        return;
    };

    match &chart.overlay {
        Overlay::None => info!(
            title = %chart.title,
            bars = chart.candles.len(),
            ha_close = last.close,
            bullish = last.is_bullish(),
            "chart updated"
        ),
        Overlay::Ssl { points } => {
            let latest = points.last().copied().map(ssl_fields);
            info!(
                title = %chart.title,
                bars = chart.candles.len(),
                ha_close = last.close,
                bullish = last.is_bullish(),
                ssl = ?latest,
                "chart updated"
            );
        }
        Overlay::Ema { span, values } => info!(
            title = %chart.title,
            bars = chart.candles.len(),
            ha_close = last.close,
            bullish = last.is_bullish(),
            ema_span = span,
            ema = values.last().copied(),
            "chart updated"
        ),
    }
    debug!(version = chart.window_version, mode = %chart.mode, "view computed");
}

/// (trend sign, smoothed down line, smoothed up line)
fn ssl_fields(point: SslPoint) -> (i8, Option<f64>, Option<f64>) {
    (point.trend.sign(), point.ssl_down_smooth, point.ssl_up_smooth)
}
