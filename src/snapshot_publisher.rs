// =============================================================================
// Snapshot Publisher — on-demand chart views over the live candle window
// =============================================================================
//
// The presentation layer polls `get_view` on a fixed interval. Each call takes
// a point-in-time copy of the whole window (never holding the lock during
// computation), runs the indicator pipeline over it, and returns a
// serialisable view. An empty window yields `View::Waiting`, not an error.
// =============================================================================

use std::sync::Arc;

use serde::Serialize;

use crate::error::{require_positive, ViewError};
use crate::indicators::{derive_series, EmaParams, HeikinAshiCandle, SslParams, SslPoint};
use crate::market_data::CandleWindow;
use crate::types::IndicatorMode;

/// One poll from the presentation layer.
///
/// `symbol` and `timeframe` only label the view; they do not change what the
/// ingestion session is subscribed to.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub symbol: String,
    pub timeframe: String,
    pub requested_bars: usize,
    pub mode: IndicatorMode,
}

impl ViewRequest {
    /// Chart heading, e.g. `BTCUSDT - 1m`.
    pub fn title(&self) -> String {
        format!("{} - {}", self.symbol.to_uppercase(), self.timeframe)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum View {
    /// No candles ingested yet.
    Waiting { title: String },
    Ready(ChartView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub title: String,
    pub mode: IndicatorMode,
    /// Window version the view was computed from.
    pub window_version: u64,
    pub candles: Vec<HeikinAshiCandle>,
    pub overlay: Overlay,
}

/// Overlay series, index-aligned with `ChartView::candles`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    None,
    Ssl { points: Vec<SslPoint> },
    Ema { span: usize, values: Vec<f64> },
}

/// Read side of the candle window.
pub struct SnapshotPublisher {
    window: Arc<CandleWindow>,
    ssl: SslParams,
    ema: EmaParams,
}

impl SnapshotPublisher {
    pub fn new(window: Arc<CandleWindow>, ssl: SslParams, ema: EmaParams) -> Self {
        Self { window, ssl, ema }
    }

    /// Build the view for `request`.
    ///
    /// Fails fast on a zero bar count, or a zero length for the indicator the
    /// mode needs.
    pub fn get_view(&self, request: &ViewRequest) -> Result<View, ViewError> {
        let bars = require_positive("requested_bars", request.requested_bars)?;
        let (ssl, ema) = match request.mode {
            IndicatorMode::HeikinAshiOnly => (None, None),
            IndicatorMode::HeikinAshiWithSsl => {
                require_positive("ssl_period", self.ssl.period)?;
                require_positive("ssl_smoothing", self.ssl.smoothing)?;
                (Some(&self.ssl), None)
            }
            IndicatorMode::HeikinAshiWithEma => {
                require_positive("ema_span", self.ema.span)?;
                (None, Some(&self.ema))
            }
        };

        let (version, candles) = self.window.snapshot_with_version(self.window.capacity());
        if candles.is_empty() {
            return Ok(View::Waiting {
                title: request.title(),
            });
        }

        let derived = derive_series(&candles, bars, ssl, ema);
        let overlay = match (derived.ssl, derived.ema) {
            (Some(points), _) => Overlay::Ssl { points },
            (None, Some(values)) => Overlay::Ema {
                span: self.ema.span,
                values,
            },
            (None, None) => Overlay::None,
        };

        Ok(View::Ready(ChartView {
            title: request.title(),
            mode: request.mode,
            window_version: version,
            candles: derived.candles,
            overlay,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_heikin_ashi;
    use crate::market_data::Candle;

    fn request(bars: usize, mode: IndicatorMode) -> ViewRequest {
        ViewRequest {
            symbol: "btcusdt".into(),
            timeframe: "1m".into(),
            requested_bars: bars,
            mode,
        }
    }

    fn filled_window(n: i64, capacity: usize) -> Arc<CandleWindow> {
        let window = Arc::new(CandleWindow::new(capacity));
        for i in 0..n {
            let base = 100.0 + (i as f64 * 0.7).sin() * 5.0;
            window.append(Candle::new(i * 60_000, base, base + 1.5, base - 1.5, base + 0.5));
        }
        window
    }

    fn publisher(window: Arc<CandleWindow>) -> SnapshotPublisher {
        SnapshotPublisher::new(window, SslParams::default(), EmaParams::default())
    }

    #[test]
    fn empty_window_is_waiting() {
        let publisher = publisher(Arc::new(CandleWindow::new(100)));
        let view = publisher.get_view(&request(20, IndicatorMode::HeikinAshiWithSsl)).unwrap();
        assert_eq!(view, View::Waiting { title: "BTCUSDT - 1m".into() });
    }

    #[test]
    fn zero_bars_is_rejected() {
        let publisher = publisher(filled_window(5, 100));
        let err = publisher.get_view(&request(0, IndicatorMode::HeikinAshiOnly)).unwrap_err();
        assert_eq!(err, ViewError::InvalidParameter { name: "requested_bars", value: 0 });
    }

    #[test]
    fn zero_indicator_length_is_rejected() {
        let window = filled_window(5, 100);
        let bad_ssl = SnapshotPublisher::new(
            window.clone(),
            SslParams { period: 0, smoothing: 5 },
            EmaParams::default(),
        );
        assert!(bad_ssl.get_view(&request(5, IndicatorMode::HeikinAshiWithSsl)).is_err());
        // The unused indicator is not checked.
        assert!(bad_ssl.get_view(&request(5, IndicatorMode::HeikinAshiWithEma)).is_ok());

        let bad_ema = SnapshotPublisher::new(window, SslParams::default(), EmaParams { span: 0 });
        let err = bad_ema.get_view(&request(5, IndicatorMode::HeikinAshiWithEma)).unwrap_err();
        assert_eq!(err, ViewError::InvalidParameter { name: "ema_span", value: 0 });
    }

    #[test]
    fn view_uses_full_window_then_truncates() {
        let window = filled_window(60, 100);
        let full = calculate_heikin_ashi(&window.snapshot(100));

        let view = publisher(window.clone()).get_view(&request(20, IndicatorMode::HeikinAshiOnly)).unwrap();
        let View::Ready(chart) = view else {
            panic!("expected a ready view");
        };
        assert_eq!(chart.candles, full[40..].to_vec());
        assert_ne!(chart.candles[0].open, calculate_heikin_ashi(&window.snapshot(20))[0].open);
        assert_eq!(chart.overlay, Overlay::None);
        assert_eq!(chart.window_version, 60);
    }

    #[test]
    fn ssl_and_ema_overlays_align_with_bars() {
        let window = filled_window(60, 100);
        let publisher = publisher(window);

        let View::Ready(ssl_view) = publisher.get_view(&request(30, IndicatorMode::HeikinAshiWithSsl)).unwrap() else {
            panic!("expected a ready view");
        };
        match &ssl_view.overlay {
            Overlay::Ssl { points } => {
                assert_eq!(points.len(), 30);
                assert_eq!(points[29].open_time, ssl_view.candles[29].open_time);
            }
            other => panic!("unexpected overlay {other:?}"),
        }

        let View::Ready(ema_view) = publisher.get_view(&request(30, IndicatorMode::HeikinAshiWithEma)).unwrap() else {
            panic!("expected a ready view");
        };
        match &ema_view.overlay {
            Overlay::Ema { span, values } => {
                assert_eq!(*span, 20);
                assert_eq!(values.len(), 30);
                assert_eq!(values[0], ema_view.candles[0].close);
            }
            other => panic!("unexpected overlay {other:?}"),
        }
    }

    #[test]
    fn view_serialises_with_status_tag() {
        let publisher = publisher(filled_window(3, 10));
        let view = publisher.get_view(&request(2, IndicatorMode::HeikinAshiWithEma)).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["title"], "BTCUSDT - 1m");
        assert_eq!(json["overlay"]["kind"], "ema");
        assert_eq!(json["candles"].as_array().unwrap().len(), 2);
    }
}
