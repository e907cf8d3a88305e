// =============================================================================
// Heikin-Ashi candles
// =============================================================================
//
// Formula, for raw candles x[0..n):
//   HA_close[i] = (open + high + low + close) / 4
//   HA_open[0]  = (x[0].open + x[0].close) / 2
//   HA_open[i]  = (HA_open[i-1] + HA_close[i-1]) / 2
//   HA_high[i]  = max(high, HA_open[i], HA_close[i])
//   HA_low[i]   = min(low,  HA_open[i], HA_close[i])
//
// HA_open chains through the synthesized series, so the result for a given
// bar depends on where the input starts. Truncate the output, never the input.
// =============================================================================

use serde::Serialize;

use crate::market_data::Candle;

/// One synthesized Heikin-Ashi bar, aligned with its raw candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeikinAshiCandle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl HeikinAshiCandle {
    /// Rising body (drawn green on the chart).
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Transform `candles` into Heikin-Ashi bars, one per input.
pub fn calculate_heikin_ashi(candles: &[Candle]) -> Vec<HeikinAshiCandle> {
    let mut result: Vec<HeikinAshiCandle> = Vec::with_capacity(candles.len());

    for c in candles {
        let close = (c.open + c.high + c.low + c.close) / 4.0;
        let open = match result.last() {
            Some(prev) => (prev.open + prev.close) / 2.0,
            None => (c.open + c.close) / 2.0,
        };
        result.push(HeikinAshiCandle {
            open_time: c.open_time,
            open,
            high: c.high.max(open).max(close),
            low: c.low.min(open).min(close),
            close,
        });
    }

    result
}
