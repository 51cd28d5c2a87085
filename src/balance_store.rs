// =============================================================================
// Balance Store — symbol -> amount / USD mark, with one in-flight flag
// =============================================================================
//
// Every flow that mutates balances (exchange, withdrawal, mining purchase,
// options stake, settlement payouts) acquires the store's `InFlightGuard`
// first. Only one such
// read-validate-write sequence may run at a time; a second caller is rejected
// rather than queued, which is what turns a double-submit into an error.
//
// Individual mutations (`commit_transfer`, `debit`, `credit`) are atomic on
// their own: they take the write lock once and re-check the non-negative
// invariant before touching anything.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{is_usable_price, Asset};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BalanceError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("insufficient {symbol} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        symbol: String,
        available: f64,
        requested: f64,
    },
    #[error("amount must be a finite, non-negative number")]
    InvalidAmount,
}

// ---------------------------------------------------------------------------
// In-flight flag
// ---------------------------------------------------------------------------

/// Single-slot flag marking that a balance-mutating operation is pending.
#[derive(Debug, Default)]
pub struct InFlightFlag {
    busy: AtomicBool,
}

impl InFlightFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. Returns `None` when another operation holds it.
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the flag on drop, including on early return via `?`.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a InFlightFlag,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Holdings store consumed by the exchange, withdrawal, mining and options
/// flows.
pub trait BalanceStore: Send + Sync {
    /// Look up one asset by id.
    fn get_asset(&self, id: &str) -> Option<Asset>;

    /// Look up one asset by ticker symbol (case-insensitive).
    fn find_by_symbol(&self, symbol: &str) -> Option<Asset>;

    /// Snapshot of every holding, in insertion order.
    fn assets(&self) -> Vec<Asset>;

    /// Move `from_amount` out of `from_id` and `to_amount` into `to_id` as a
    /// single atomic step. Returns the committed `(from, to)` balances.
    fn commit_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        from_amount: f64,
        to_amount: f64,
    ) -> Result<(f64, f64), BalanceError>;

    /// Remove `amount` from one asset. Returns the new balance.
    fn debit(&self, id: &str, amount: f64) -> Result<f64, BalanceError>;

    /// Add `amount` to one asset. Returns the new balance.
    fn credit(&self, id: &str, amount: f64) -> Result<f64, BalanceError>;

    /// Update the USD mark of every asset with the given symbol.
    fn set_price(&self, symbol: &str, price_usd: f64);

    /// The store's single in-flight flag.
    fn in_flight(&self) -> &InFlightFlag;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// `BalanceStore` backed by a `Vec<Asset>` behind a `parking_lot::RwLock`.
pub struct InMemoryBalanceStore {
    assets: RwLock<Vec<Asset>>,
    in_flight: InFlightFlag,
}

impl InMemoryBalanceStore {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets: RwLock::new(assets),
            in_flight: InFlightFlag::new(),
        }
    }

    /// Sum of every holding marked to USD.
    pub fn total_value_usd(&self) -> f64 {
        self.assets.read().iter().map(Asset::value_usd).sum()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn get_asset(&self, id: &str) -> Option<Asset> {
        self.assets.read().iter().find(|a| a.id == id).cloned()
    }

    fn find_by_symbol(&self, symbol: &str) -> Option<Asset> {
        self.assets
            .read()
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    fn assets(&self) -> Vec<Asset> {
        self.assets.read().clone()
    }

    fn commit_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        from_amount: f64,
        to_amount: f64,
    ) -> Result<(f64, f64), BalanceError> {
        if !from_amount.is_finite() || from_amount < 0.0 || !to_amount.is_finite() || to_amount < 0.0 {
            return Err(BalanceError::InvalidAmount);
        }

        let mut assets = self.assets.write();
        let from_idx = assets
            .iter()
            .position(|a| a.id == from_id)
            .ok_or_else(|| BalanceError::UnknownAsset(from_id.to_string()))?;
        let to_idx = assets
            .iter()
            .position(|a| a.id == to_id)
            .ok_or_else(|| BalanceError::UnknownAsset(to_id.to_string()))?;

        let from = &assets[from_idx];
        if from_amount > from.amount {
            return Err(BalanceError::InsufficientBalance {
                symbol: from.symbol.clone(),
                available: from.amount,
                requested: from_amount,
            });
        }

        assets[from_idx].amount -= from_amount;
        assets[to_idx].amount += to_amount;
        let balances = (assets[from_idx].amount, assets[to_idx].amount);

        info!(
            from = %from_id,
            to = %to_id,
            from_amount,
            to_amount,
            from_balance = balances.0,
            to_balance = balances.1,
            "transfer committed"
        );
        Ok(balances)
    }

    fn debit(&self, id: &str, amount: f64) -> Result<f64, BalanceError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BalanceError::InvalidAmount);
        }

        let mut assets = self.assets.write();
        let asset = assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| BalanceError::UnknownAsset(id.to_string()))?;

        if amount > asset.amount {
            warn!(asset = %id, available = asset.amount, requested = amount, "debit rejected");
            return Err(BalanceError::InsufficientBalance {
                symbol: asset.symbol.clone(),
                available: asset.amount,
                requested: amount,
            });
        }

        asset.amount -= amount;
        debug!(asset = %id, amount, balance = asset.amount, "debit applied");
        Ok(asset.amount)
    }

    fn credit(&self, id: &str, amount: f64) -> Result<f64, BalanceError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(BalanceError::InvalidAmount);
        }

        let mut assets = self.assets.write();
        let asset = assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| BalanceError::UnknownAsset(id.to_string()))?;

        asset.amount += amount;
        debug!(asset = %id, amount, balance = asset.amount, "credit applied");
        Ok(asset.amount)
    }

    fn set_price(&self, symbol: &str, price_usd: f64) {
        if !is_usable_price(price_usd) {
            warn!(symbol, price_usd, "ignoring unusable price update");
            return;
        }
        let mut assets = self.assets.write();
        for asset in assets.iter_mut().filter(|a| a.symbol.eq_ignore_ascii_case(symbol)) {
            asset.price_usd = price_usd;
        }
    }

    fn in_flight(&self) -> &InFlightFlag {
        &self.in_flight
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryBalanceStore {
        InMemoryBalanceStore::new(vec![
            Asset::new("bitcoin", "BTC", "Bitcoin", 1.0, 60_000.0),
            Asset::new("tether", "USDT", "Tether", 500.0, 1.0),
        ])
    }

    #[test]
    fn commit_transfer_moves_both_sides() {
        let s = store();
        let (from, to) = s.commit_transfer("bitcoin", "tether", 0.25, 15_000.0).unwrap();
        assert!((from - 0.75).abs() < 1e-12);
        assert!((to - 15_500.0).abs() < 1e-9);
        assert!((s.get_asset("bitcoin").unwrap().amount - 0.75).abs() < 1e-12);
        assert!((s.get_asset("tether").unwrap().amount - 15_500.0).abs() < 1e-9);
    }

    #[test]
    fn commit_transfer_rejects_overdraft_without_mutation() {
        let s = store();
        let before = s.assets();
        let err = s.commit_transfer("bitcoin", "tether", 2.0, 120_000.0).unwrap_err();
        assert!(matches!(err, BalanceError::InsufficientBalance { .. }));
        assert_eq!(s.assets(), before);
    }

    #[test]
    fn commit_transfer_unknown_destination_leaves_source_untouched() {
        let s = store();
        let err = s.commit_transfer("bitcoin", "dogecoin", 0.1, 1.0).unwrap_err();
        assert_eq!(err, BalanceError::UnknownAsset("dogecoin".into()));
        assert!((s.get_asset("bitcoin").unwrap().amount - 1.0).abs() < 1e-12);
    }

    #[test]
    fn debit_and_credit() {
        let s = store();
        assert!((s.debit("tether", 100.0).unwrap() - 400.0).abs() < 1e-9);
        assert!((s.credit("tether", 50.0).unwrap() - 450.0).abs() < 1e-9);
        assert!(matches!(
            s.debit("tether", 1_000.0),
            Err(BalanceError::InsufficientBalance { .. })
        ));
        assert_eq!(s.credit("tether", f64::NAN), Err(BalanceError::InvalidAmount));
    }

    #[test]
    fn set_price_matches_symbol_and_ignores_bad_marks() {
        let s = store();
        s.set_price("btc", 61_000.0);
        assert!((s.get_asset("bitcoin").unwrap().price_usd - 61_000.0).abs() < 1e-9);
        s.set_price("BTC", 0.0);
        assert!((s.get_asset("bitcoin").unwrap().price_usd - 61_000.0).abs() < 1e-9);
    }

    #[test]
    fn in_flight_flag_is_exclusive_and_released_on_drop() {
        let s = store();
        let guard = s.in_flight().try_acquire();
        assert!(guard.is_some());
        assert!(s.in_flight().is_busy());
        assert!(s.in_flight().try_acquire().is_none());
        drop(guard);
        assert!(!s.in_flight().is_busy());
        assert!(s.in_flight().try_acquire().is_some());
    }

    #[test]
    fn total_value_marks_every_holding() {
        let s = store();
        assert!((s.total_value_usd() - 60_500.0).abs() < 1e-9);
    }
}
