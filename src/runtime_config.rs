// =============================================================================
// Runtime Configuration — feed, window and indicator settings
// =============================================================================
//
// Loaded once at startup from a JSON file; every field carries
// `#[serde(default)]` so a partial (or empty) file is valid. Environment
// overrides are applied by `main` on top of the loaded values.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::{EmaParams, SslParams};
use crate::market_data::SessionConfig;
use crate::types::IndicatorMode;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_stream_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_symbol() -> String {
    "btcusdt".to_string()
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_subscription_id() -> u64 {
    1
}

fn default_capacity() -> usize {
    1000
}

fn default_requested_bars() -> usize {
    1000
}

fn default_ssl_period() -> usize {
    10
}

fn default_ssl_smoothing() -> usize {
    5
}

fn default_ema_span() -> usize {
    20
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Feed ---------------------------------------------------------------

    /// WebSocket endpoint of the kline feed.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Kline interval, e.g. `1m`, `5m`, `15m`.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// `id` field of the SUBSCRIBE request.
    #[serde(default = "default_subscription_id")]
    pub subscription_id: u64,

    /// Flat wait between a failed connection and the next attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    // --- Window & view ------------------------------------------------------

    /// Maximum number of raw candles retained.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Bars per view.
    #[serde(default = "default_requested_bars")]
    pub requested_bars: usize,

    #[serde(default)]
    pub indicator_mode: IndicatorMode,

    /// View poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // --- Indicators ---------------------------------------------------------

    #[serde(default = "default_ssl_period")]
    pub ssl_period: usize,

    /// EMA span applied to both SSL lines.
    #[serde(default = "default_ssl_smoothing")]
    pub ssl_smoothing: usize,

    #[serde(default = "default_ema_span")]
    pub ema_span: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            symbol: default_symbol(),
            interval: default_interval(),
            subscription_id: default_subscription_id(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            capacity: default_capacity(),
            requested_bars: default_requested_bars(),
            indicator_mode: IndicatorMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            ssl_period: default_ssl_period(),
            ssl_smoothing: default_ssl_smoothing(),
            ema_span: default_ema_span(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            mode = %config.indicator_mode,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.stream_url.trim().is_empty(), "stream_url must not be empty");
        ensure!(!self.symbol.trim().is_empty(), "symbol must not be empty");
        ensure!(!self.interval.trim().is_empty(), "interval must not be empty");
        ensure!(self.capacity > 0, "capacity must be at least 1");
        ensure!(self.requested_bars > 0, "requested_bars must be at least 1");
        ensure!(self.ssl_period > 0, "ssl_period must be at least 1");
        ensure!(self.ssl_smoothing > 0, "ssl_smoothing must be at least 1");
        ensure!(self.ema_span > 0, "ema_span must be at least 1");
        ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be at least 1");
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.stream_url.clone(),
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            subscription_id: self.subscription_id,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
        }
    }

    pub fn ssl_params(&self) -> SslParams {
        SslParams {
            period: self.ssl_period,
            smoothing: self.ssl_smoothing,
        }
    }

    pub fn ema_params(&self) -> EmaParams {
        EmaParams {
            span: self.ema_span,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.stream_url, "wss://stream.binance.com:9443/ws");
        assert_eq!(cfg.symbol, "btcusdt");
        assert_eq!(cfg.interval, "1m");
        assert_eq!(cfg.capacity, 1000);
        assert_eq!(cfg.requested_bars, 1000);
        assert_eq!(cfg.indicator_mode, IndicatorMode::HeikinAshiWithEma);
        assert_eq!(cfg.ssl_params(), SslParams { period: 10, smoothing: 5 });
        assert_eq!(cfg.ema_params(), EmaParams { span: 20 });
        assert_eq!(cfg.session_config().reconnect_delay, Duration::from_secs(5));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "btcusdt");
        assert_eq!(cfg.subscription_id, 1);
        assert_eq!(cfg.reconnect_delay_secs, 5);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ethusdt", "capacity": 200, "indicator_mode": "HeikinAshiWithSsl" }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ethusdt");
        assert_eq!(cfg.capacity, 200);
        assert_eq!(cfg.indicator_mode, IndicatorMode::HeikinAshiWithSsl);
        assert_eq!(cfg.ema_span, 20);
    }

    #[test]
    fn validate_rejects_zero_lengths() {
        let mut cfg = RuntimeConfig::default();
        cfg.capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.ssl_smoothing = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.symbol = "  ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/kline_config.json").is_err());
    }
}
