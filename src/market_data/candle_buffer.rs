use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC candle. `time` is the bucket start in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// A flat candle where every price equals `price`.
    pub fn flat(time: i64, price: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub interval: String,
}

impl CandleKey {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            interval: interval.to_string(),
        }
    }
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// ---------------------------------------------------------------------------
// CandleBuffer -- thread-safe ring buffer per (symbol, interval)
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer that stores the most recent candles per
/// `(symbol, interval)` pair, oldest first. Candle times within a series are
/// kept strictly increasing: an update for the current bucket replaces the
/// last candle, an update for an earlier bucket is dropped.
pub struct CandleBuffer {
    buffers: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    max_candles: usize,
}

impl CandleBuffer {
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_candles: max_candles.max(1),
        }
    }

    /// Insert or replace the latest candle for the given key.
    pub fn update(&self, key: CandleKey, candle: Candle) {
        let mut map = self.buffers.write();
        let ring = map
            .entry(key)
            .or_insert_with(|| VecDeque::with_capacity(self.max_candles + 1));

        match ring.back() {
            Some(last) if candle.time < last.time => {
                debug!(time = candle.time, last = last.time, "stale candle dropped");
                return;
            }
            Some(last) if candle.time == last.time => {
                ring.pop_back();
            }
            _ => {}
        }

        ring.push_back(candle);
        while ring.len() > self.max_candles {
            ring.pop_front();
        }
    }

    /// Fold a traded price into the candle for `bucket_time`.
    ///
    /// A new bucket opens at the previous close so consecutive candles join
    /// up on the chart.
    pub fn apply_tick(&self, key: &CandleKey, bucket_time: i64, price: f64) {
        let current = {
            let map = self.buffers.read();
            map.get(key).and_then(|ring| ring.back().copied())
        };

        let candle = match current {
            Some(last) if last.time == bucket_time => Candle {
                high: last.high.max(price),
                low: last.low.min(price),
                close: price,
                ..last
            },
            Some(last) if last.time > bucket_time => return,
            Some(last) => Candle {
                time: bucket_time,
                open: last.close,
                high: last.close.max(price),
                low: last.close.min(price),
                close: price,
            },
            None => Candle::flat(bucket_time, price),
        };

        self.update(key.clone(), candle);
    }

    /// Return the most recent `count` candles (oldest-first order).
    pub fn get(&self, key: &CandleKey, count: usize) -> Vec<Candle> {
        let map = self.buffers.read();
        match map.get(key) {
            Some(ring) => {
                let start = ring.len().saturating_sub(count);
                ring.iter().skip(start).copied().collect()
            }
            None => Vec::new(),
        }
    }

    /// Return the most recent `count` close prices (oldest-first order).
    pub fn get_closes(&self, key: &CandleKey, count: usize) -> Vec<f64> {
        self.get(key, count).iter().map(|c| c.close).collect()
    }

    /// Close price of the most recent candle, if any.
    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        let map = self.buffers.read();
        map.get(key).and_then(|ring| ring.back().map(|c| c.close))
    }

    pub fn count(&self, key: &CandleKey) -> usize {
        let map = self.buffers.read();
        map.get(key).map_or(0, VecDeque::len)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
