// =============================================================================
// Runtime Configuration — desk settings with atomic save
// =============================================================================
//
// Seed holdings, feed parameters, product terms and chart defaults all live
// here. Persistence uses an atomic tmp + rename pattern to prevent corruption
// on crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorSpec;
use crate::mining::MiningPlan;
use crate::options::{default_terms, OptionsTerms};
use crate::types::Asset;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_assets() -> Vec<Asset> {
    vec![
        Asset::new("bitcoin", "BTC", "Bitcoin", 0.5, 67_000.0),
        Asset::new("ethereum", "ETH", "Ethereum", 4.0, 3_500.0),
        Asset::new("tether", "USDT", "Tether", 10_000.0, 1.0),
        Asset::new("solana", "SOL", "Solana", 50.0, 150.0),
        Asset::new("binancecoin", "BNB", "BNB", 8.0, 580.0),
    ]
}

fn default_feed_symbols() -> Vec<String> {
    vec![
        "BTC".to_string(),
        "ETH".to_string(),
        "SOL".to_string(),
        "BNB".to_string(),
        "USDT".to_string(),
    ]
}

fn default_pegged_symbols() -> Vec<String> {
    vec!["USDT".to_string()]
}

fn default_candle_interval() -> String {
    "1m".to_string()
}

fn default_bucket_secs() -> i64 {
    60
}

fn default_tick_interval_ms() -> u64 {
    2_000
}

fn default_volatility_pct() -> f64 {
    0.15
}

fn default_candle_capacity() -> usize {
    500
}

fn default_seed_candles() -> usize {
    120
}

fn default_activity_capacity() -> usize {
    500
}

fn default_settlement_interval_ms() -> u64 {
    1_000
}

fn default_mining_plans() -> Vec<MiningPlan> {
    vec![
        MiningPlan::new("starter-7", 7, 4.2, 500.0),
        MiningPlan::new("growth-15", 15, 10.5, 1_000.0),
        MiningPlan::new("pro-30", 30, 24.0, 5_000.0),
        MiningPlan::new("elite-90", 90, 81.0, 20_000.0),
    ]
}

fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::Ma { period: 7 },
        IndicatorSpec::Ma { period: 25 },
        IndicatorSpec::Rsi { period: 14 },
    ]
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the desk.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Holdings ------------------------------------------------------------

    /// Holdings the balance store starts with.
    #[serde(default = "default_assets")]
    pub assets: Vec<Asset>,

    // --- Simulated feed ------------------------------------------------------

    /// Symbols the feed produces candles for.
    #[serde(default = "default_feed_symbols")]
    pub feed_symbols: Vec<String>,

    /// Symbols whose mark is held fixed (stablecoins).
    #[serde(default = "default_pegged_symbols")]
    pub pegged_symbols: Vec<String>,

    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    /// Width of one candle bucket in seconds; must agree with `candle_interval`.
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: i64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Largest single-tick move, in percent of the current mark.
    #[serde(default = "default_volatility_pct")]
    pub volatility_pct: f64,

    /// Candles retained per (symbol, interval).
    #[serde(default = "default_candle_capacity")]
    pub candle_capacity: usize,

    /// History generated at startup so charts are populated immediately.
    #[serde(default = "default_seed_candles")]
    pub seed_candles: usize,

    // --- Products ------------------------------------------------------------

    #[serde(default = "default_terms")]
    pub options_terms: Vec<OptionsTerms>,

    #[serde(default = "default_mining_plans")]
    pub mining_plans: Vec<MiningPlan>,

    /// How often expired options and matured mining orders are settled.
    #[serde(default = "default_settlement_interval_ms")]
    pub settlement_interval_ms: u64,

    // --- Presentation ----------------------------------------------------------

    /// Overlays drawn when a client does not ask for specific ones.
    #[serde(default = "default_indicators")]
    pub default_indicators: Vec<IndicatorSpec>,

    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            feed_symbols: default_feed_symbols(),
            pegged_symbols: default_pegged_symbols(),
            candle_interval: default_candle_interval(),
            bucket_secs: default_bucket_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            volatility_pct: default_volatility_pct(),
            candle_capacity: default_candle_capacity(),
            seed_candles: default_seed_candles(),
            options_terms: default_terms(),
            mining_plans: default_mining_plans(),
            settlement_interval_ms: default_settlement_interval_ms(),
            default_indicators: default_indicators(),
            activity_capacity: default_activity_capacity(),
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
            assets = config.assets.len(),
            feed_symbols = ?config.feed_symbols,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Replace `feed_symbols` from a comma-separated override such as
    /// `AURORA_DESK_SYMBOLS=BTC,ETH`. Blank entries are skipped; an override
    /// with no usable entries leaves the list untouched.
    pub fn apply_symbol_override(&mut self, raw: &str) {
        let symbols: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !symbols.is_empty() {
            self.feed_symbols = symbols;
        }
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
        assert_eq!(cfg.assets.len(), 5);
        assert_eq!(cfg.assets[0].symbol, "BTC");
        assert!(cfg.assets.iter().any(|a| a.symbol == "USDT"));
        assert_eq!(cfg.pegged_symbols, vec!["USDT"]);
        assert_eq!(cfg.candle_interval, "1m");
        assert_eq!(cfg.bucket_secs, 60);
        assert_eq!(cfg.options_terms.len(), 3);
        assert!((cfg.options_terms[1].profit_pct - 90.0).abs() < f64::EPSILON);
        assert_eq!(cfg.default_indicators[2], IndicatorSpec::Rsi { period: 14 });
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.feed_symbols.len(), 5);
        assert_eq!(cfg.mining_plans.len(), 4);
        assert_eq!(cfg.candle_capacity, 500);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "feed_symbols": ["ETH"],
            "assets": [{ "id": "ethereum", "symbol": "ETH", "name": "Ethereum", "amount": 2.0 }]
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.feed_symbols, vec!["ETH"]);
        assert_eq!(cfg.assets[0].price_usd, 0.0);
        assert_eq!(cfg.seed_candles, 120);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("aurora-desk-{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.volatility_pct = 0.5;
        cfg.save(&path).unwrap();
        let loaded = RuntimeConfig::load(&path).unwrap();
        assert!((loaded.volatility_pct - 0.5).abs() < f64::EPSILON);
        assert_eq!(loaded.mining_plans, cfg.mining_plans);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn symbol_override() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_symbol_override(" btc, ,sol ");
        assert_eq!(cfg.feed_symbols, vec!["BTC", "SOL"]);
        cfg.apply_symbol_override(" , ");
        assert_eq!(cfg.feed_symbols, vec!["BTC", "SOL"]);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/aurora-desk.json").is_err());
    }
}
