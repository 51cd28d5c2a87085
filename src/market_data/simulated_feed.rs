// =============================================================================
// Simulated Price Feed — bounded random walk driving marks and candles
// =============================================================================
//
// Each tick moves every walked symbol by a uniform step in
// [-volatility_pct, +volatility_pct] percent of its current mark, writes the
// new mark into the balance store and folds it into the candle for the
// current bucket. Pegged symbols (stablecoins) keep their mark and still get
// flat candles so charts never come back empty.
// =============================================================================

use rand::Rng;
use tracing::{debug, info};

use crate::balance_store::BalanceStore;
use crate::types::is_usable_price;

use super::{CandleBuffer, CandleKey};

/// Floor applied so a long losing walk never produces an unusable mark.
const MIN_PRICE: f64 = 1e-9;

pub struct SimulatedFeed {
    symbols: Vec<String>,
    pegged: Vec<String>,
    interval: String,
    bucket_secs: i64,
    volatility_pct: f64,
}

impl SimulatedFeed {
    pub fn new(
        symbols: Vec<String>,
        pegged: Vec<String>,
        interval: &str,
        bucket_secs: i64,
        volatility_pct: f64,
    ) -> Self {
        Self {
            symbols: symbols.into_iter().map(|s| s.to_uppercase()).collect(),
            pegged: pegged.into_iter().map(|s| s.to_uppercase()).collect(),
            interval: interval.to_string(),
            bucket_secs: bucket_secs.max(1),
            volatility_pct: volatility_pct.abs(),
        }
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn key(&self, symbol: &str) -> CandleKey {
        CandleKey::new(symbol, &self.interval)
    }

    /// Start of the candle bucket containing `now_secs`.
    pub fn bucket(&self, now_secs: i64) -> i64 {
        now_secs - now_secs.rem_euclid(self.bucket_secs)
    }

    fn is_pegged(&self, symbol: &str) -> bool {
        self.pegged.iter().any(|p| p == symbol)
    }

    /// Advance every symbol by one step using the thread RNG.
    pub fn tick(&self, store: &dyn BalanceStore, candles: &CandleBuffer, now_secs: i64) {
        let mut rng = rand::rng();
        self.tick_with(&mut rng, store, candles, now_secs);
    }

    /// Advance every symbol by one step using `rng`.
    pub fn tick_with<R: Rng>(
        &self,
        rng: &mut R,
        store: &dyn BalanceStore,
        candles: &CandleBuffer,
        now_secs: i64,
    ) {
        let bucket = self.bucket(now_secs);
        for symbol in &self.symbols {
            let Some(asset) = store.find_by_symbol(symbol) else {
                continue;
            };
            if !is_usable_price(asset.price_usd) {
                continue;
            }

            let price = if self.is_pegged(symbol) {
                asset.price_usd
            } else {
                let step: f64 = rng.random_range(-1.0..=1.0);
                let next = asset.price_usd * (1.0 + step * self.volatility_pct / 100.0);
                let next = next.max(MIN_PRICE);
                store.set_price(symbol, next);
                next
            };

            candles.apply_tick(&self.key(symbol), bucket, price);
            debug!(symbol = %symbol, price, bucket, "feed tick");
        }
    }

    /// Backfill `count` buckets of history ending at the bucket for
    /// `now_secs`, so overlays have data right after startup.
    pub fn seed_history<R: Rng>(
        &self,
        rng: &mut R,
        store: &dyn BalanceStore,
        candles: &CandleBuffer,
        now_secs: i64,
        count: usize,
    ) {
        let end = self.bucket(now_secs);
        for i in (0..count as i64).rev() {
            let t = end - i * self.bucket_secs;
            // A few intra-bucket ticks give each candle a real high/low range.
            for _ in 0..4 {
                self.tick_with(rng, store, candles, t);
            }
        }
        info!(symbols = ?self.symbols, count, interval = %self.interval, "price history seeded");
    }
}
