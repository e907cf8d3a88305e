// =============================================================================
// SSL Channel
// =============================================================================
//
// Built on Heikin-Ashi bars:
//   smaHigh / smaLow = rolling mean of HA high / HA low over `period`
//   trend = Up   when HA close breaks above smaHigh
//         = Down when HA close breaks below smaLow
//         = previous trend otherwise (Neutral at index 0)
//   sslDown = smaHigh in a down-trend, smaLow otherwise
//   sslUp   = smaLow  in a down-trend, smaHigh otherwise
// Both lines are then smoothed with an EMA of span `smoothing`.
//
// While the rolling window is still filling (i < period - 1) the SMA values
// are undefined; comparisons against them never flip the trend.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::calculate_ema_partial;
use super::heikin_ashi::HeikinAshiCandle;

/// Rolling-window and smoothing lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslParams {
    pub period: usize,
    pub smoothing: usize,
}

impl Default for SslParams {
    fn default() -> Self {
        Self {
            period: 10,
            smoothing: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn sign(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
            Self::Neutral => 0,
        }
    }

    fn next(self, close: f64, sma_high: Option<f64>, sma_low: Option<f64>) -> Self {
        match (sma_high, sma_low) {
            (Some(high), _) if close > high => Self::Up,
            (_, Some(low)) if close < low => Self::Down,
            _ => self,
        }
    }
}

/// SSL values for one bar, index-aligned with the input HA series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SslPoint {
    pub open_time: i64,
    pub sma_high: Option<f64>,
    pub sma_low: Option<f64>,
    pub trend: Trend,
    pub ssl_down: Option<f64>,
    pub ssl_up: Option<f64>,
    pub ssl_down_smooth: Option<f64>,
    pub ssl_up_smooth: Option<f64>,
}

/// Simple moving average over a trailing window of `period` values.
///
/// `None` while fewer than `period` values are available. All `None` when
/// `period == 0`.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}

/// Compute the SSL channel for `candles`.
///
/// Returns an empty `Vec` for empty input or when either length is zero.
pub fn calculate_ssl(candles: &[HeikinAshiCandle], params: &SslParams) -> Vec<SslPoint> {
    if candles.is_empty() || params.period == 0 || params.smoothing == 0 {
        return Vec::new();
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let sma_high = rolling_mean(&highs, params.period);
    let sma_low = rolling_mean(&lows, params.period);

    let mut trends = Vec::with_capacity(candles.len());
    let mut trend = Trend::Neutral;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 {
            trend = trend.next(c.close, sma_high[i], sma_low[i]);
        }
        trends.push(trend);
    }

    let (ssl_down, ssl_up): (Vec<Option<f64>>, Vec<Option<f64>>) = trends
        .iter()
        .zip(sma_high.iter().zip(&sma_low))
        .map(|(trend, (&high, &low))| match trend {
            Trend::Down => (high, low),
            Trend::Up | Trend::Neutral => (low, high),
        })
        .unzip();

    let down_smooth = calculate_ema_partial(&ssl_down, params.smoothing);
    let up_smooth = calculate_ema_partial(&ssl_up, params.smoothing);

    (0..candles.len())
        .map(|i| SslPoint {
            open_time: candles[i].open_time,
            sma_high: sma_high[i],
            sma_low: sma_low[i],
            trend: trends[i],
            ssl_down: ssl_down[i],
            ssl_up: ssl_up[i],
            ssl_down_smooth: down_smooth[i],
            ssl_up_smooth: up_smooth[i],
        })
        .collect()
}
