use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC bar from the kline stream.
///
/// Price sanity (`low <= min(open, close)`, `high >= max(open, close)`) is the
/// feed's responsibility and is not re-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
        }
    }

    /// Open time as a UTC timestamp. Out-of-range values map to `None`.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.open_time).single()
    }
}

// ---------------------------------------------------------------------------
// CandleWindow -- bounded FIFO of raw candles
// ---------------------------------------------------------------------------

struct WindowInner {
    candles: VecDeque<Candle>,
    version: u64,
}

/// Bounded, arrival-ordered buffer of raw candles.
///
/// Exactly one writer (the ingestion session) appends; any number of readers
/// take point-in-time copies through [`CandleWindow::snapshot`]. When an
/// append pushes the length past `capacity`, the oldest candles are dropped.
pub struct CandleWindow {
    inner: RwLock<WindowInner>,
    capacity: usize,
}

impl CandleWindow {
    /// Create an empty window that retains at most `capacity` candles.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(WindowInner {
                candles: VecDeque::with_capacity(capacity + 1),
                version: 0,
            }),
            capacity,
        }
    }

    /// Append `candle` at the tail, evicting from the head while over capacity.
    pub fn append(&self, candle: Candle) {
        let mut inner = self.inner.write();
        inner.candles.push_back(candle);
        while inner.candles.len() > self.capacity {
            inner.candles.pop_front();
        }
        inner.version += 1;
    }

    /// Return the last `min(n, len)` candles, oldest first, as an owned copy.
    ///
    /// An empty result means "no data yet", not an error.
    pub fn snapshot(&self, n: usize) -> Vec<Candle> {
        self.snapshot_with_version(n).1
    }

    /// Like [`snapshot`](Self::snapshot), also returning the version observed
    /// under the same read lock.
    pub fn snapshot_with_version(&self, n: usize) -> (u64, Vec<Candle>) {
        let inner = self.inner.read();
        let start = inner.candles.len().saturating_sub(n);
        let copy = inner.candles.range(start..).copied().collect();
        (inner.version, copy)
    }

    pub fn len(&self) -> usize {
        self.inner.read().candles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(i: i64) -> Candle {
        let close = 100.0 + i as f64;
        Candle::new(i * 60_000, close, close + 1.0, close - 1.0, close)
    }

    #[test]
    fn eviction_keeps_last_capacity_in_order() {
        let window = CandleWindow::new(3);
        for i in 0..5 {
            window.append(sample_candle(i));
            assert!(window.len() <= 3);
        }

        assert_eq!(window.len(), 3);
        let times: Vec<i64> = window.snapshot(3).iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![120_000, 180_000, 240_000]);
    }

    #[test]
    fn snapshot_matches_last_appended_for_long_sequences() {
        let cap = 50;
        let window = CandleWindow::new(cap);
        let appended: Vec<Candle> = (0..237).map(sample_candle).collect();
        for c in &appended {
            window.append(*c);
        }
        assert_eq!(window.snapshot(cap), appended[appended.len() - cap..].to_vec());
    }

    #[test]
    fn snapshot_shorter_than_request_returns_everything() {
        let window = CandleWindow::new(10);
        window.append(sample_candle(0));
        window.append(sample_candle(1));
        assert_eq!(window.snapshot(100).len(), 2);
        assert_eq!(window.snapshot(1), vec![sample_candle(1)]);
    }

    #[test]
    fn empty_or_zero_request_yields_empty() {
        let window = CandleWindow::new(10);
        assert!(window.snapshot(10).is_empty());
        window.append(sample_candle(0));
        assert!(window.snapshot(0).is_empty());
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let window = CandleWindow::new(2);
        window.append(sample_candle(0));
        window.append(sample_candle(1));
        let (version, before) = window.snapshot_with_version(2);

        window.append(sample_candle(2));
        assert_eq!(before, vec![sample_candle(0), sample_candle(1)]);
        assert_eq!(version, 2);
        assert_eq!(window.snapshot_with_version(0).0, 3);
    }

    #[test]
    fn candle_time_converts_millis() {
        let c = Candle::new(1_700_000_000_000, 1.0, 1.0, 1.0, 1.0);
        let t = c.time().expect("valid timestamp");
        assert_eq!(t.timestamp(), 1_700_000_000);
    }
}
