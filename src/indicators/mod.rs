// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator code. Every call recomputes from scratch;
// nothing is cached between calls.

pub mod ema;
pub mod heikin_ashi;
pub mod ssl;

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

pub use heikin_ashi::{calculate_heikin_ashi, HeikinAshiCandle};
pub use ssl::{calculate_ssl, SslParams, SslPoint};

/// Span of the plain EMA overlay on HA closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmaParams {
    pub span: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self { span: 20 }
    }
}

/// Output of [`derive_series`]. Overlays are index-aligned with `candles`.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSeries {
    pub candles: Vec<HeikinAshiCandle>,
    pub ssl: Option<Vec<SslPoint>>,
    pub ema: Option<Vec<f64>>,
}

/// Run the indicator pipeline over a snapshot of raw candles.
///
/// Heikin-Ashi is computed over the whole of `candles` first, then only the
/// last `bars` HA bars are kept, then the requested overlays are computed over
/// the kept bars.
pub fn derive_series(
    candles: &[Candle],
    bars: usize,
    ssl: Option<&SslParams>,
    ema: Option<&EmaParams>,
) -> DerivedSeries {
    let mut ha = calculate_heikin_ashi(candles);
    let start = ha.len().saturating_sub(bars);
    let ha = ha.split_off(start);

    let ssl = ssl.map(|params| calculate_ssl(&ha, params));
    let ema = ema.map(|params| {
        let closes: Vec<f64> = ha.iter().map(|c| c.close).collect();
        ema::calculate_ema(&closes, params.span)
    });

    DerivedSeries {
        candles: ha,
        ssl,
        ema,
    }
}
