// =============================================================================
// Withdrawals — form validation and balance debit
// =============================================================================
//
// Validation reports every field problem at once so the form can highlight
// all of them. Submission runs validation and the debit inside the balance
// store's in-flight guard: the balance checked is the balance debited.
// =============================================================================

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::balance_store::{BalanceError, BalanceStore};
use crate::transaction_pin::TransactionPin;
use crate::types::Asset;

// ---------------------------------------------------------------------------
// Request / receipt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub asset_id: String,
    pub address: String,
    pub amount: f64,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalReceipt {
    /// `0x` followed by 64 hex digits.
    pub tx_id: String,
    pub asset: String,
    pub amount: f64,
    pub address: String,
    pub new_balance: f64,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalIssue {
    #[error("Recipient address is required.")]
    AddressRequired,
    #[error("Invalid Bitcoin address format.")]
    InvalidBitcoinAddress,
    #[error("Invalid Ethereum-based address format.")]
    InvalidEvmAddress,
    #[error("Please enter a valid amount.")]
    InvalidAmount,
    #[error("Amount exceeds available balance.")]
    ExceedsBalance,
    #[error("Transaction password is required.")]
    PasswordRequired,
    #[error("Transaction password is not set.")]
    PasswordNotSet,
    #[error("Transaction password is incorrect.")]
    WrongPassword,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WithdrawalError {
    #[error("withdrawal request is invalid")]
    Invalid(Vec<WithdrawalIssue>),
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("another balance operation is already being processed")]
    InFlight,
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Address prefix rules per network.
fn address_issue(symbol: &str, address: &str) -> Option<WithdrawalIssue> {
    let address = address.trim();
    if address.is_empty() {
        return Some(WithdrawalIssue::AddressRequired);
    }
    match symbol {
        "BTC" => {
            let ok = ["bc1", "1", "3"].iter().any(|p| address.starts_with(p));
            (!ok).then_some(WithdrawalIssue::InvalidBitcoinAddress)
        }
        "ETH" | "USDT" => (!address.starts_with("0x")).then_some(WithdrawalIssue::InvalidEvmAddress),
        _ => None,
    }
}

/// Check every field of `req` against `asset` and the stored PIN.
pub fn validate_withdrawal(
    asset: &Asset,
    req: &WithdrawalRequest,
    pin: Option<&TransactionPin>,
) -> Vec<WithdrawalIssue> {
    let mut issues = Vec::new();

    if let Some(issue) = address_issue(&asset.symbol, &req.address) {
        issues.push(issue);
    }

    if !req.amount.is_finite() || req.amount <= 0.0 {
        issues.push(WithdrawalIssue::InvalidAmount);
    } else if req.amount > asset.amount {
        issues.push(WithdrawalIssue::ExceedsBalance);
    }

    if req.password.is_empty() {
        issues.push(WithdrawalIssue::PasswordRequired);
    } else {
        match pin {
            None => issues.push(WithdrawalIssue::PasswordNotSet),
            Some(pin) if !pin.verify(&req.password) => issues.push(WithdrawalIssue::WrongPassword),
            Some(_) => {}
        }
    }

    issues
}

/// Synthetic on-chain transaction hash.
fn transaction_id() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Desk
// ---------------------------------------------------------------------------

/// Owns the transaction PIN and processes withdrawals.
#[derive(Default)]
pub struct WithdrawalDesk {
    pin: RwLock<Option<TransactionPin>>,
}

impl WithdrawalDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pin(&self, pin: TransactionPin) {
        *self.pin.write() = Some(pin);
        info!("transaction password updated");
    }

    pub fn has_pin(&self) -> bool {
        self.pin.read().is_some()
    }

    pub fn submit(
        &self,
        store: &dyn BalanceStore,
        req: &WithdrawalRequest,
    ) -> Result<WithdrawalReceipt, WithdrawalError> {
        let _guard = store
            .in_flight()
            .try_acquire()
            .ok_or(WithdrawalError::InFlight)?;

        let asset = store
            .get_asset(&req.asset_id)
            .ok_or_else(|| WithdrawalError::UnknownAsset(req.asset_id.clone()))?;

        let issues = validate_withdrawal(&asset, req, self.pin.read().as_ref());
        if !issues.is_empty() {
            warn!(asset = %asset.symbol, ?issues, "withdrawal rejected");
            return Err(WithdrawalError::Invalid(issues));
        }

        let new_balance = store.debit(&asset.id, req.amount)?;
        let receipt = WithdrawalReceipt {
            tx_id: transaction_id(),
            asset: asset.symbol.clone(),
            amount: req.amount,
            address: req.address.trim().to_string(),
            new_balance,
            timestamp: Utc::now().to_rfc3339(),
        };

        info!(
            tx_id = %receipt.tx_id,
            asset = %receipt.asset,
            amount = receipt.amount,
            "withdrawal submitted"
        );
        Ok(receipt)
    }
}
