// =============================================================================
// Central Application State — Aurora Desk
// =============================================================================
//
// Ties the balance store, market data, product desks and per-session UI state
// together behind one `Arc<AppState>` shared by the REST handlers and the
// background loops.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - Arc wrappers for subsystems that manage their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::balance_store::{BalanceStore, InMemoryBalanceStore};
use crate::exchange::ExchangeCalculator;
use crate::history::{ActivityKind, ActivityLog, ActivityStatus};
use crate::market_data::{CandleBuffer, SimulatedFeed};
use crate::mining::{MiningDesk, SETTLEMENT_SYMBOL};
use crate::navigation::NavigationStack;
use crate::options::{OptionsDesk, TradeStatus};
use crate::runtime_config::RuntimeConfig;
use crate::session::SessionState;
use crate::types::Asset;
use crate::withdrawal::WithdrawalDesk;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event surfaced to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Machine-readable error code, matching the API error body.
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Holdings plus their combined USD value.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub state_version: u64,
    pub total_value_usd: f64,
    pub assets: Vec<Asset>,
    pub transfer_in_flight: bool,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every balance or session mutation so clients can poll
    /// cheaply for changes.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Holdings ────────────────────────────────────────────────────────
    pub store: Arc<InMemoryBalanceStore>,
    pub exchange: ExchangeCalculator<InMemoryBalanceStore>,

    // ── Market Data ─────────────────────────────────────────────────────
    pub candle_buffer: Arc<CandleBuffer>,
    pub feed: SimulatedFeed,

    // ── Products ────────────────────────────────────────────────────────
    pub withdrawals: WithdrawalDesk,
    pub mining: MiningDesk,
    pub options: OptionsDesk,
    pub activity: ActivityLog,

    // ── Session / UI ────────────────────────────────────────────────────
    pub session: RwLock<SessionState>,
    pub navigation: RwLock<NavigationStack>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the desk was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let store = Arc::new(InMemoryBalanceStore::new(config.assets.clone()));
        let feed = SimulatedFeed::new(
            config.feed_symbols.clone(),
            config.pegged_symbols.clone(),
            &config.candle_interval,
            config.bucket_secs,
            config.volatility_pct,
        );

        Self {
            state_version: AtomicU64::new(0),
            exchange: ExchangeCalculator::new(Arc::clone(&store)),
            store,
            candle_buffer: Arc::new(CandleBuffer::new(config.candle_capacity)),
            feed,
            withdrawals: WithdrawalDesk::new(),
            mining: MiningDesk::new(config.mining_plans.clone()),
            options: OptionsDesk::new(config.options_terms.clone()),
            activity: ActivityLog::new(config.activity_capacity),
            session: RwLock::new(SessionState::default()),
            navigation: RwLock::new(NavigationStack::default()),
            recent_errors: RwLock::new(Vec::new()),
            runtime_config: Arc::new(RwLock::new(config)),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error. The ring buffer is capped at [`MAX_RECENT_ERRORS`].
    pub fn push_error_with_code(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    pub fn portfolio(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            state_version: self.current_state_version(),
            total_value_usd: self.store.total_value_usd(),
            assets: self.store.assets(),
            transfer_in_flight: self.store.in_flight().is_busy(),
        }
    }

    // ── Background work ─────────────────────────────────────────────────

    /// One feed step: move every mark and fold it into the candles.
    pub fn tick_feed(&self, now_secs: i64) {
        self.feed.tick(self.store.as_ref(), &self.candle_buffer, now_secs);
        self.increment_version();
    }

    /// Settle expired options and matured mining orders, logging each
    /// outcome. Returns the number of positions settled.
    pub fn settle_due(&self, now_secs: i64) -> usize {
        let options = self.options.settle_expired(self.store.as_ref(), now_secs);
        for trade in &options {
            let status = match trade.status {
                TradeStatus::Win => ActivityStatus::Win,
                _ => ActivityStatus::Loss,
            };
            let amount = if status == ActivityStatus::Win { trade.payout } else { trade.amount };
            self.activity.record(
                ActivityKind::Option,
                SETTLEMENT_SYMBOL,
                amount,
                status,
                format!("{}/{} {:?}", trade.symbol, SETTLEMENT_SYMBOL, trade.direction),
            );
        }

        let matured = self.mining.settle_matured(self.store.as_ref(), now_secs);
        for inv in &matured {
            self.activity.record(
                ActivityKind::Mining,
                SETTLEMENT_SYMBOL,
                inv.expected_return(),
                ActivityStatus::Completed,
                inv.plan_id.clone(),
            );
        }

        let settled = options.len() + matured.len();
        if settled > 0 {
            debug!(options = options.len(), mining = matured.len(), "positions settled");
            self.increment_version();
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
    use crate::options::{Direction, OpenTrade};

    #[test]
    fn new_state_reflects_config() {
        let state = AppState::new(RuntimeConfig::default());
        let snap = state.portfolio();
        assert_eq!(snap.assets.len(), 5);
        assert!(snap.total_value_usd > 0.0);
        assert!(!snap.transfer_in_flight);
        assert_eq!(state.mining.plans().len(), 4);
        assert_eq!(state.navigation.read().depth(), 1);
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(RuntimeConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error_with_code(format!("e{i}"), None);
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "e5");
    }

    #[test]
    fn tick_feed_populates_candles_and_bumps_version() {
        let state = AppState::new(RuntimeConfig::default());
        state.tick_feed(1_700_000_000);
        assert_eq!(state.current_state_version(), 1);
        let key = state.feed.key("BTC");
        assert_eq!(state.candle_buffer.count(&key), 1);
    }

    #[test]
    fn settle_due_records_activity() {
        let state = AppState::new(RuntimeConfig::default());
        let req = OpenTrade {
            symbol: "BTC".into(),
            direction: Direction::Higher,
            duration_secs: 30,
            amount: 100.0,
        };
        state.options.open(state.store.as_ref(), &req, 0).unwrap();
        assert_eq!(state.settle_due(10), 0);
        assert_eq!(state.settle_due(30), 1);
        let log = state.activity.list(Some(ActivityKind::Option));
        assert_eq!(log.len(), 1);
        // Mark did not move, so HIGHER loses.
        assert_eq!(log[0].status, ActivityStatus::Loss);
    }
}
