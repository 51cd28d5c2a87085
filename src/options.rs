// =============================================================================
// Options — fixed-payout HIGHER / LOWER contracts
// =============================================================================
//
// The USDT stake is debited when the contract opens. At or after expiry the
// contract compares the underlying's mark against the entry price:
//   HIGHER wins on close > entry, LOWER wins on close < entry.
// An unchanged price loses for both directions. A win credits
// stake * (1 + profit_pct / 100); a loss credits nothing.
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::balance_store::{BalanceError, BalanceStore};
use crate::mining::SETTLEMENT_SYMBOL;
use crate::types::is_usable_price;

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionsTerms {
    pub duration_secs: u32,
    pub profit_pct: f64,
    pub min_amount: f64,
}

impl OptionsTerms {
    pub fn payout(&self, amount: f64) -> f64 {
        amount * (1.0 + self.profit_pct / 100.0)
    }
}

/// 30s / 60s / 90s contracts.
pub fn default_terms() -> Vec<OptionsTerms> {
    vec![
        OptionsTerms { duration_secs: 30, profit_pct: 85.0, min_amount: 100.0 },
        OptionsTerms { duration_secs: 60, profit_pct: 90.0, min_amount: 500.0 },
        OptionsTerms { duration_secs: 90, profit_pct: 95.0, min_amount: 1_000.0 },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    pub fn wins(self, entry: f64, close: f64) -> bool {
        match self {
            Direction::Higher => close > entry,
            Direction::Lower => close < entry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Active,
    Win,
    Loss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTrade {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub amount: f64,
    pub entry_price: f64,
    pub profit_pct: f64,
    pub payout: f64,
    pub opened_at: i64,
    pub expires_at: i64,
    pub status: TradeStatus,
    #[serde(default)]
    pub close_price: Option<f64>,
}

impl OptionTrade {
    /// Live P/L shown while the contract runs: the profit if it would win at
    /// `price`, otherwise the whole stake lost.
    pub fn projected_pnl(&self, price: f64) -> f64 {
        if self.direction.wins(self.entry_price, price) {
            self.payout - self.amount
        } else {
            -self.amount
        }
    }

    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("unsupported timeframe: {0}s")]
    UnknownTimeframe(u32),
    #[error("Please enter a valid amount.")]
    InvalidAmount,
    #[error("Minimum amount for this timeframe is {min} USDT.")]
    BelowMinimum { min: f64 },
    #[error("Insufficient USDT balance.")]
    InsufficientBalance,
    #[error("no price available for {0}")]
    NoPrice(String),
    #[error("unknown trade: {0}")]
    UnknownTrade(String),
    #[error("trade {0} has not expired yet")]
    NotExpired(String),
    #[error("trade {0} is already settled")]
    AlreadySettled(String),
    #[error("no USDT holding configured")]
    NoSettlementAsset,
    #[error("another balance operation is already being processed")]
    InFlight,
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenTrade {
    pub symbol: String,
    pub direction: Direction,
    pub duration_secs: u32,
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// Desk
// ---------------------------------------------------------------------------

pub struct OptionsDesk {
    terms: Vec<OptionsTerms>,
    trades: RwLock<Vec<OptionTrade>>,
}

impl OptionsDesk {
    pub fn new(terms: Vec<OptionsTerms>) -> Self {
        Self {
            terms,
            trades: RwLock::new(Vec::new()),
        }
    }

    pub fn terms(&self) -> &[OptionsTerms] {
        &self.terms
    }

    pub fn trades(&self) -> Vec<OptionTrade> {
        self.trades.read().clone()
    }

    pub fn open(
        &self,
        store: &dyn BalanceStore,
        req: &OpenTrade,
        now: i64,
    ) -> Result<OptionTrade, OptionsError> {
        let terms = self
            .terms
            .iter()
            .find(|t| t.duration_secs == req.duration_secs)
            .copied()
            .ok_or(OptionsError::UnknownTimeframe(req.duration_secs))?;
        if !req.amount.is_finite() || req.amount <= 0.0 {
            return Err(OptionsError::InvalidAmount);
        }
        if req.amount < terms.min_amount {
            return Err(OptionsError::BelowMinimum { min: terms.min_amount });
        }

        let entry_price = store
            .find_by_symbol(&req.symbol)
            .map(|a| a.price_usd)
            .filter(|p| is_usable_price(*p))
            .ok_or_else(|| OptionsError::NoPrice(req.symbol.clone()))?;

        let _guard = store.in_flight().try_acquire().ok_or(OptionsError::InFlight)?;
        let usdt = store
            .find_by_symbol(SETTLEMENT_SYMBOL)
            .ok_or(OptionsError::NoSettlementAsset)?;
        if req.amount > usdt.amount {
            return Err(OptionsError::InsufficientBalance);
        }
        store.debit(&usdt.id, req.amount)?;

        let trade = OptionTrade {
            id: Uuid::new_v4().to_string(),
            symbol: req.symbol.to_uppercase(),
            direction: req.direction,
            amount: req.amount,
            entry_price,
            profit_pct: terms.profit_pct,
            payout: terms.payout(req.amount),
            opened_at: now,
            expires_at: now + terms.duration_secs as i64,
            status: TradeStatus::Active,
            close_price: None,
        };
        self.trades.write().push(trade.clone());

        info!(
            id = %trade.id,
            symbol = %trade.symbol,
            direction = ?trade.direction,
            amount = trade.amount,
            entry = trade.entry_price,
            expires_at = trade.expires_at,
            "option opened"
        );
        Ok(trade)
    }

    /// Settle one contract against `close_price`. Rejected with `InFlight`
    /// while another balance operation holds the store.
    pub fn settle(
        &self,
        store: &dyn BalanceStore,
        trade_id: &str,
        close_price: f64,
        now: i64,
    ) -> Result<OptionTrade, OptionsError> {
        let _guard = store.in_flight().try_acquire().ok_or(OptionsError::InFlight)?;
        self.settle_held(store, trade_id, close_price, now)
    }

    /// Caller holds the store's in-flight guard.
    fn settle_held(
        &self,
        store: &dyn BalanceStore,
        trade_id: &str,
        close_price: f64,
        now: i64,
    ) -> Result<OptionTrade, OptionsError> {
        let mut trades = self.trades.write();
        let trade = trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or_else(|| OptionsError::UnknownTrade(trade_id.to_string()))?;
        if trade.status != TradeStatus::Active {
            return Err(OptionsError::AlreadySettled(trade_id.to_string()));
        }
        if now < trade.expires_at {
            return Err(OptionsError::NotExpired(trade_id.to_string()));
        }

        if trade.direction.wins(trade.entry_price, close_price) {
            let usdt = store
                .find_by_symbol(SETTLEMENT_SYMBOL)
                .ok_or(OptionsError::NoSettlementAsset)?;
            store.credit(&usdt.id, trade.payout)?;
            trade.status = TradeStatus::Win;
        } else {
            trade.status = TradeStatus::Loss;
        }
        trade.close_price = Some(close_price);

        info!(
            id = %trade.id,
            status = ?trade.status,
            entry = trade.entry_price,
            close = close_price,
            "option settled"
        );
        Ok(trade.clone())
    }

    /// Settle every expired contract at the store's current mark. The pass is
    /// skipped while another balance operation is in flight and picked up by
    /// the next call.
    pub fn settle_expired(&self, store: &dyn BalanceStore, now: i64) -> Vec<OptionTrade> {
        let Some(_guard) = store.in_flight().try_acquire() else {
            debug!("options settlement deferred: balance operation in flight");
            return Vec::new();
        };

        let due: Vec<(String, String)> = self
            .trades
            .read()
            .iter()
            .filter(|t| t.status == TradeStatus::Active && now >= t.expires_at)
            .map(|t| (t.id.clone(), t.symbol.clone()))
            .collect();

        let mut settled = Vec::new();
        for (id, symbol) in due {
            let Some(price) = store
                .find_by_symbol(&symbol)
                .map(|a| a.price_usd)
                .filter(|p| is_usable_price(*p))
            else {
                warn!(id = %id, symbol = %symbol, "no mark to settle option against");
                continue;
            };
            match self.settle_held(store, &id, price, now) {
                Ok(trade) => settled.push(trade),
                Err(e) => warn!(id = %id, error = %e, "option settlement failed"),
            }
        }
        settled
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance_store::InMemoryBalanceStore;
    use crate::types::Asset;

    fn store() -> InMemoryBalanceStore {
        InMemoryBalanceStore::new(vec![
            Asset::new("bitcoin", "BTC", "Bitcoin", 0.1, 60_000.0),
            Asset::new("tether", "USDT", "Tether", 2_000.0, 1.0),
        ])
    }

    fn open(direction: Direction, duration_secs: u32, amount: f64) -> OpenTrade {
        OpenTrade {
            symbol: "btc".into(),
            direction,
            duration_secs,
            amount,
        }
    }

    fn usdt(s: &InMemoryBalanceStore) -> f64 {
        s.get_asset("tether").unwrap().amount
    }

    #[test]
    fn opening_validates_terms() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        assert_eq!(
            d.open(&s, &open(Direction::Higher, 45, 200.0), 0).unwrap_err(),
            OptionsError::UnknownTimeframe(45)
        );
        assert_eq!(
            d.open(&s, &open(Direction::Higher, 30, 0.0), 0).unwrap_err(),
            OptionsError::InvalidAmount
        );
        assert_eq!(
            d.open(&s, &open(Direction::Higher, 60, 200.0), 0).unwrap_err(),
            OptionsError::BelowMinimum { min: 500.0 }
        );
        assert_eq!(
            d.open(&s, &open(Direction::Higher, 90, 5_000.0), 0).unwrap_err(),
            OptionsError::InsufficientBalance
        );
        assert_eq!(usdt(&s), 2_000.0);
    }

    #[test]
    fn winning_higher_pays_out() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        let t = d.open(&s, &open(Direction::Higher, 30, 100.0), 1_000).unwrap();
        assert_eq!(t.symbol, "BTC");
        assert!((t.payout - 185.0).abs() < 1e-9);
        assert!((usdt(&s) - 1_900.0).abs() < 1e-9);

        assert_eq!(
            d.settle(&s, &t.id, 61_000.0, 1_029).unwrap_err(),
            OptionsError::NotExpired(t.id.clone())
        );
        let settled = d.settle(&s, &t.id, 61_000.0, 1_030).unwrap();
        assert_eq!(settled.status, TradeStatus::Win);
        assert!((usdt(&s) - 2_085.0).abs() < 1e-9);
        assert_eq!(
            d.settle(&s, &t.id, 61_000.0, 1_031).unwrap_err(),
            OptionsError::AlreadySettled(t.id.clone())
        );
    }

    #[test]
    fn unchanged_price_loses_both_ways() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        let hi = d.open(&s, &open(Direction::Higher, 30, 100.0), 0).unwrap();
        let lo = d.open(&s, &open(Direction::Lower, 30, 100.0), 0).unwrap();
        assert_eq!(d.settle(&s, &hi.id, 60_000.0, 30).unwrap().status, TradeStatus::Loss);
        assert_eq!(d.settle(&s, &lo.id, 60_000.0, 30).unwrap().status, TradeStatus::Loss);
        assert!((usdt(&s) - 1_800.0).abs() < 1e-9);
    }

    #[test]
    fn settle_expired_uses_current_mark() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        d.open(&s, &open(Direction::Lower, 30, 100.0), 0).unwrap();
        d.open(&s, &open(Direction::Lower, 60, 500.0), 0).unwrap();
        s.set_price("BTC", 59_000.0);

        let settled = d.settle_expired(&s, 45);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].status, TradeStatus::Win);
        assert_eq!(settled[0].close_price, Some(59_000.0));
        assert_eq!(d.trades().iter().filter(|t| t.status == TradeStatus::Active).count(), 1);
    }

    #[test]
    fn settlement_waits_for_in_flight_operation() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        let t = d.open(&s, &open(Direction::Higher, 30, 100.0), 0).unwrap();
        s.set_price("BTC", 61_000.0);

        let pending = s.in_flight().try_acquire().unwrap();
        assert!(d.settle_expired(&s, 30).is_empty());
        assert_eq!(d.settle(&s, &t.id, 61_000.0, 30).unwrap_err(), OptionsError::InFlight);
        assert!((usdt(&s) - 1_900.0).abs() < 1e-9);
        assert_eq!(d.trades()[0].status, TradeStatus::Active);
        drop(pending);

        let settled = d.settle_expired(&s, 31);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].status, TradeStatus::Win);
        assert!((usdt(&s) - 2_085.0).abs() < 1e-9);
        assert!(!s.in_flight().is_busy());
    }

    #[test]
    fn projected_pnl_tracks_direction() {
        let s = store();
        let d = OptionsDesk::new(default_terms());
        let t = d.open(&s, &open(Direction::Higher, 60, 500.0), 0).unwrap();
        assert!((t.projected_pnl(60_500.0) - 450.0).abs() < 1e-9);
        assert!((t.projected_pnl(59_500.0) + 500.0).abs() < 1e-9);
        assert_eq!(t.remaining_secs(20), 40);
        assert_eq!(t.remaining_secs(100), 0);
    }
}
