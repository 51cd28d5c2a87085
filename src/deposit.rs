// =============================================================================
// Deposits — receiving addresses and pending deposit notices
// =============================================================================
//
// A deposit notice is only a claim until the chain confirms it, so it is
// logged as pending and never credits a balance here.
// =============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::balance_store::BalanceStore;
use crate::history::{ActivityKind, ActivityLog, ActivityStatus};

const ADDRESS_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ADDRESS_BODY_LEN: usize = 38;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepositError {
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("please enter a valid amount")]
    InvalidAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositNotice {
    pub asset_id: String,
    pub amount: f64,
    /// Name of the uploaded transfer screenshot, if any.
    #[serde(default)]
    pub proof_file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositTicket {
    pub id: String,
    pub asset: String,
    pub amount: f64,
    pub status: ActivityStatus,
}

/// Receiving address for `symbol`: `bc1q…` on Bitcoin, `0x…` elsewhere.
pub fn deposit_address(symbol: &str) -> String {
    let prefix = if symbol.eq_ignore_ascii_case("BTC") { "bc1q" } else { "0x" };
    let mut rng = rand::rng();
    let body: String = (0..ADDRESS_BODY_LEN)
        .map(|_| ADDRESS_CHARS[rng.random_range(0..ADDRESS_CHARS.len())] as char)
        .collect();
    format!("{prefix}{body}")
}

/// Log a pending deposit for `notice`.
pub fn record_deposit(
    store: &dyn BalanceStore,
    log: &ActivityLog,
    notice: &DepositNotice,
) -> Result<DepositTicket, DepositError> {
    let asset = store
        .get_asset(&notice.asset_id)
        .ok_or_else(|| DepositError::UnknownAsset(notice.asset_id.clone()))?;
    if !notice.amount.is_finite() || notice.amount <= 0.0 {
        return Err(DepositError::InvalidAmount);
    }

    let detail = notice.proof_file.clone().unwrap_or_default();
    let id = log.record(
        ActivityKind::Deposit,
        &asset.symbol,
        notice.amount,
        ActivityStatus::Pending,
        detail,
    );
    info!(id = %id, asset = %asset.symbol, amount = notice.amount, "deposit notice recorded");

    Ok(DepositTicket {
        id,
        asset: asset.symbol,
        amount: notice.amount,
        status: ActivityStatus::Pending,
    })
}
