use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle, either freshly polled or resampled from a finer
/// timeframe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Unix seconds of the candle's open.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub asset: String,
    pub timeframe: String,
}

impl CandleKey {
    pub fn new(asset: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            asset: asset.into().to_uppercase(),
            timeframe: timeframe.into(),
        }
    }
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.asset, self.timeframe)
    }
}

// ---------------------------------------------------------------------------
// CandleBuffer -- single-mutex ring buffer per (asset, timeframe)
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer that stores the most recent 1-minute candles per
/// asset. Coarser timeframes are resampled on read from the 1-minute series
/// (SPEC_FULL.md §4.A); the buffer itself only ever stores the base
/// timeframe to keep the single-writer invariant simple.
pub struct CandleBuffer {
    series: RwLock<HashMap<String, VecDeque<Candle>>>,
    capacity: usize,
}

impl CandleBuffer {
    /// `capacity` bounds the number of 1-minute candles retained per asset
    /// (SPEC_FULL.md §4.A specifies roughly 5000).
    pub fn new(capacity: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Append a closed 1-minute candle for `asset`, trimming the oldest entry
    /// once the ring exceeds capacity. Duplicate timestamps (the feed polls
    /// more often than once a minute) replace the existing entry rather than
    /// appending a second one.
    pub fn push(&self, asset: &str, candle: Candle) {
        let mut map = self.series.write();
        let ring = map
            .entry(asset.to_uppercase())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity + 1));

        if let Some(last) = ring.back_mut() {
            if last.timestamp == candle.timestamp {
                *last = candle;
                return;
            }
        }
        ring.push_back(candle);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Return up to `limit` of the most recent 1-minute candles, oldest
    /// first, deduplicated and sorted by timestamp.
    pub fn recent(&self, asset: &str, limit: usize) -> Vec<Candle> {
        let map = self.series.read();
        match map.get(&asset.to_uppercase()) {
            Some(ring) => {
                let start = ring.len().saturating_sub(limit);
                ring.iter().skip(start).copied().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn last_close(&self, asset: &str) -> Option<f64> {
        let map = self.series.read();
        map.get(&asset.to_uppercase())
            .and_then(|ring| ring.back())
            .map(|c| c.close)
    }

    pub fn count(&self, asset: &str) -> usize {
        let map = self.series.read();
        map.get(&asset.to_uppercase()).map_or(0, VecDeque::len)
    }

    /// Asset symbols currently tracked, for the health-loop's observational
    /// logging (SPEC_FULL.md §4.G `health_loop`).
    pub fn tracked_assets(&self) -> Vec<String> {
        self.series.read().keys().cloned().collect()
    }
}

/// Merge a persisted candle series with the live in-memory tail, deduping by
/// timestamp (persisted rows win on a clash since they represent a fully
/// closed, durable candle).
pub fn merge_persisted_and_live(mut persisted: Vec<Candle>, live: Vec<Candle>) -> Vec<Candle> {
    let seen: std::collections::HashSet<i64> = persisted.iter().map(|c| c.timestamp).collect();
    persisted.extend(live.into_iter().filter(|c| !seen.contains(&c.timestamp)));
    persisted.sort_by_key(|c| c.timestamp);
    persisted
}

/// Resample a 1-minute candle series into a coarser `bucket_seconds` bucket
/// using standard OHLCV aggregation: first open, max high, min low, last
/// close, summed volume (SPEC_FULL.md §4.A).
pub fn resample(candles: &[Candle], bucket_seconds: i64) -> Vec<Candle> {
    if bucket_seconds <= 0 || candles.is_empty() {
        return candles.to_vec();
    }
    let mut buckets: Vec<Candle> = Vec::new();
    let mut current_bucket_start = i64::MIN;

    for c in candles {
        let bucket_start = (c.timestamp / bucket_seconds) * bucket_seconds;
        if bucket_start != current_bucket_start {
            buckets.push(Candle {
                timestamp: bucket_start,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            });
            current_bucket_start = bucket_start;
        } else if let Some(last) = buckets.last_mut() {
            last.high = last.high.max(c.high);
            last.low = last.low.min(c.low);
            last.close = c.close;
            last.volume += c.volume;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(ts: i64, close: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn ring_buffer_trims_to_capacity() {
        let buf = CandleBuffer::new(3);
        for i in 0..5 {
            buf.push("BTC", c(i * 60, 100.0 + i as f64));
        }
        assert_eq!(buf.count("BTC"), 3);
        let recent = buf.recent("BTC", 10);
        assert_eq!(recent.iter().map(|c| c.close).collect::<Vec<_>>(), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn push_same_timestamp_replaces_not_appends() {
        let buf = CandleBuffer::new(10);
        buf.push("ETH", c(0, 100.0));
        buf.push("ETH", c(0, 101.0));
        assert_eq!(buf.count("ETH"), 1);
        assert_eq!(buf.last_close("ETH"), Some(101.0));
    }

    #[test]
    fn merge_dedupes_by_timestamp_preferring_persisted() {
        let persisted = vec![c(0, 100.0), c(60, 101.0)];
        let live = vec![c(60, 999.0), c(120, 102.0)];
        let merged = merge_persisted_and_live(persisted, live);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].close, 101.0); // persisted wins
        assert_eq!(merged[2].timestamp, 120);
    }

    #[test]
    fn resample_aggregates_ohlcv_correctly() {
        let ones = vec![c(0, 10.0), c(60, 12.0), c(120, 8.0), c(180, 11.0)];
        let out = resample(&ones, 120);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].open, 10.0);
        assert_eq!(out[0].high, 13.0); // max(11,13) from c(0) high / c(60) high
        assert_eq!(out[0].close, 12.0);
        assert_eq!(out[0].volume, 20.0);
        assert_eq!(out[1].open, 8.0);
        assert_eq!(out[1].close, 11.0);
    }

    #[test]
    fn resample_empty_is_empty() {
        assert!(resample(&[], 300).is_empty());
    }
}
