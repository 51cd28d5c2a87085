// =============================================================================
// Mining — fixed-term USDT staking plans
// =============================================================================
//
// A purchase locks USDT for `cycle_days`. Once the cycle has elapsed the order
// reads as Completed and `settle_matured` pays principal plus yield back to
// the USDT balance exactly once.
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::balance_store::{BalanceError, BalanceStore};

pub const SETTLEMENT_SYMBOL: &str = "USDT";
const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningPlan {
    pub id: String,
    pub cycle_days: u32,
    /// Total yield over the cycle, in percent.
    pub yield_pct: f64,
    pub min_limit: f64,
}

impl MiningPlan {
    pub fn new(id: &str, cycle_days: u32, yield_pct: f64, min_limit: f64) -> Self {
        Self {
            id: id.to_string(),
            cycle_days,
            yield_pct,
            min_limit,
        }
    }

    /// Yield per day, in percent.
    pub fn daily_revenue(&self) -> f64 {
        if self.cycle_days == 0 {
            return 0.0;
        }
        self.yield_pct / self.cycle_days as f64
    }

    pub fn estimated_earnings(&self, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        amount * self.yield_pct / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MiningError {
    #[error("unknown mining plan: {0}")]
    UnknownPlan(String),
    #[error("You must agree to the Mining Rules.")]
    TermsNotAccepted,
    #[error("Please enter a valid amount.")]
    InvalidAmount,
    #[error("Minimum investment is {min} USDT.")]
    BelowMinimum { min: f64 },
    #[error("Insufficient USDT balance.")]
    InsufficientBalance,
    #[error("no USDT holding configured")]
    NoSettlementAsset,
    #[error("another balance operation is already being processed")]
    InFlight,
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub plan_id: String,
    pub amount: f64,
    pub yield_pct: f64,
    pub cycle_days: u32,
    pub started_at: i64,
    #[serde(default)]
    pub settled: bool,
}

impl Investment {
    pub fn matures_at(&self) -> i64 {
        self.started_at + self.cycle_days as i64 * SECS_PER_DAY
    }

    pub fn status(&self, now: i64) -> OrderStatus {
        if now >= self.matures_at() {
            OrderStatus::Completed
        } else {
            OrderStatus::Active
        }
    }

    pub fn expected_return(&self) -> f64 {
        self.amount * (1.0 + self.yield_pct / 100.0)
    }
}

/// One row of the orders screen.
#[derive(Debug, Clone, Serialize)]
pub struct MiningOrder {
    #[serde(flatten)]
    pub investment: Investment,
    pub status: OrderStatus,
    pub matures_at: i64,
    pub earnings: f64,
}

// ---------------------------------------------------------------------------
// Desk
// ---------------------------------------------------------------------------

pub struct MiningDesk {
    plans: Vec<MiningPlan>,
    investments: RwLock<Vec<Investment>>,
}

impl MiningDesk {
    pub fn new(plans: Vec<MiningPlan>) -> Self {
        Self {
            plans,
            investments: RwLock::new(Vec::new()),
        }
    }

    pub fn plans(&self) -> &[MiningPlan] {
        &self.plans
    }

    pub fn plan(&self, id: &str) -> Option<&MiningPlan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn invest(
        &self,
        store: &dyn BalanceStore,
        plan_id: &str,
        amount: f64,
        accepted_terms: bool,
        now: i64,
    ) -> Result<Investment, MiningError> {
        let plan = self
            .plan(plan_id)
            .ok_or_else(|| MiningError::UnknownPlan(plan_id.to_string()))?;
        if !accepted_terms {
            return Err(MiningError::TermsNotAccepted);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(MiningError::InvalidAmount);
        }
        if amount < plan.min_limit {
            return Err(MiningError::BelowMinimum { min: plan.min_limit });
        }

        let _guard = store.in_flight().try_acquire().ok_or(MiningError::InFlight)?;
        let usdt = store
            .find_by_symbol(SETTLEMENT_SYMBOL)
            .ok_or(MiningError::NoSettlementAsset)?;
        if amount > usdt.amount {
            return Err(MiningError::InsufficientBalance);
        }
        store.debit(&usdt.id, amount)?;

        let investment = Investment {
            id: Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            amount,
            yield_pct: plan.yield_pct,
            cycle_days: plan.cycle_days,
            started_at: now,
            settled: false,
        };
        self.investments.write().push(investment.clone());

        info!(
            id = %investment.id,
            plan = %plan.id,
            amount,
            matures_at = investment.matures_at(),
            "mining investment opened"
        );
        Ok(investment)
    }

    /// Every investment with its status as of `now`, newest first.
    pub fn orders(&self, now: i64) -> Vec<MiningOrder> {
        self.investments
            .read()
            .iter()
            .rev()
            .map(|inv| MiningOrder {
                status: inv.status(now),
                matures_at: inv.matures_at(),
                earnings: inv.amount * inv.yield_pct / 100.0,
                investment: inv.clone(),
            })
            .collect()
    }

    /// Credit principal plus yield for every investment matured by `now` and
    /// not yet paid. Returns the investments paid out by this call; empty
    /// while another balance operation is in flight.
    pub fn settle_matured(&self, store: &dyn BalanceStore, now: i64) -> Vec<Investment> {
        let Some(_guard) = store.in_flight().try_acquire() else {
            debug!("mining payouts deferred: balance operation in flight");
            return Vec::new();
        };
        let Some(usdt) = store.find_by_symbol(SETTLEMENT_SYMBOL) else {
            return Vec::new();
        };

        let mut paid = Vec::new();
        let mut investments = self.investments.write();
        for inv in investments
            .iter_mut()
            .filter(|inv| !inv.settled && inv.status(now) == OrderStatus::Completed)
        {
            match store.credit(&usdt.id, inv.expected_return()) {
                Ok(balance) => {
                    inv.settled = true;
                    info!(id = %inv.id, payout = inv.expected_return(), balance, "mining investment matured");
                    paid.push(inv.clone());
                }
                Err(e) => warn!(id = %inv.id, error = %e, "mining payout failed"),
            }
        }
        paid
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

    fn store(usdt: f64) -> InMemoryBalanceStore {
        InMemoryBalanceStore::new(vec![Asset::new("tether", "USDT", "Tether", usdt, 1.0)])
    }

    fn desk() -> MiningDesk {
        MiningDesk::new(vec![
            MiningPlan::new("p7", 7, 4.2, 500.0),
            MiningPlan::new("p30", 30, 21.0, 2_000.0),
        ])
    }

    #[test]
    fn plan_figures() {
        let p = MiningPlan::new("p30", 30, 21.0, 2_000.0);
        assert!((p.daily_revenue() - 0.7).abs() < 1e-12);
        assert!((p.estimated_earnings(10_000.0) - 2_100.0).abs() < 1e-9);
        assert_eq!(p.estimated_earnings(-1.0), 0.0);
        assert_eq!(MiningPlan::new("z", 0, 5.0, 0.0).daily_revenue(), 0.0);
    }

    #[test]
    fn purchase_validation() {
        let s = store(1_000.0);
        let d = desk();
        assert_eq!(
            d.invest(&s, "nope", 600.0, true, 0).unwrap_err(),
            MiningError::UnknownPlan("nope".into())
        );
        assert_eq!(d.invest(&s, "p7", 600.0, false, 0).unwrap_err(), MiningError::TermsNotAccepted);
        assert_eq!(d.invest(&s, "p7", f64::NAN, true, 0).unwrap_err(), MiningError::InvalidAmount);
        assert_eq!(
            d.invest(&s, "p7", 100.0, true, 0).unwrap_err(),
            MiningError::BelowMinimum { min: 500.0 }
        );
        assert_eq!(
            d.invest(&s, "p30", 2_500.0, true, 0).unwrap_err(),
            MiningError::InsufficientBalance
        );
        assert_eq!(s.get_asset("tether").unwrap().amount, 1_000.0);
    }

    #[test]
    fn purchase_debits_and_matures_once() {
        let s = store(1_000.0);
        let d = desk();
        let start = 1_700_000_000;
        let inv = d.invest(&s, "p7", 600.0, true, start).unwrap();
        assert!((s.get_asset("tether").unwrap().amount - 400.0).abs() < 1e-9);

        let day6 = start + 6 * SECS_PER_DAY;
        assert_eq!(d.orders(day6)[0].status, OrderStatus::Active);
        assert!(d.settle_matured(&s, day6).is_empty());

        let day7 = inv.matures_at();
        assert_eq!(d.orders(day7)[0].status, OrderStatus::Completed);
        assert_eq!(d.settle_matured(&s, day7).len(), 1);
        assert!((s.get_asset("tether").unwrap().amount - (400.0 + 625.2)).abs() < 1e-9);

        assert!(d.settle_matured(&s, day7 + 10).is_empty());
        assert!((s.get_asset("tether").unwrap().amount - 1_025.2).abs() < 1e-9);
    }

    #[test]
    fn payout_deferred_while_in_flight() {
        let s = store(1_000.0);
        let d = desk();
        let inv = d.invest(&s, "p7", 600.0, true, 0).unwrap();

        let pending = s.in_flight().try_acquire().unwrap();
        assert!(d.settle_matured(&s, inv.matures_at()).is_empty());
        assert!((s.get_asset("tether").unwrap().amount - 400.0).abs() < 1e-9);
        drop(pending);

        assert_eq!(d.settle_matured(&s, inv.matures_at()).len(), 1);
        assert!((s.get_asset("tether").unwrap().amount - 1_025.2).abs() < 1e-9);
        assert!(!s.in_flight().is_busy());
    }

    #[test]
    fn purchase_rejected_while_in_flight() {
        let s = store(1_000.0);
        let _pending = s.in_flight().try_acquire().unwrap();
        assert_eq!(desk().invest(&s, "p7", 600.0, true, 0).unwrap_err(), MiningError::InFlight);
    }
}
