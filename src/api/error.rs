// =============================================================================
// API Errors — domain errors mapped onto HTTP responses
// =============================================================================
//
// Every rejection is rendered as `{ "error": <message>, "code": <code> }`,
// plus `issues` for multi-field validation failures.
//
//   404  unknown asset / plan / trade
//   409  in-flight operation, insufficient balance, settlement ordering
//   422  request validation
//   500  misconfiguration
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::balance_store::BalanceError;
use crate::deposit::DepositError;
use crate::exchange::ExchangeError;
use crate::mining::MiningError;
use crate::options::OptionsError;
use crate::transaction_pin::PinError;
use crate::withdrawal::WithdrawalError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub issues: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            issues: None,
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
        });
        if let Some(issues) = self.issues {
            body["issues"] = issues;
        }
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<BalanceError> for ApiError {
    fn from(err: BalanceError) -> Self {
        let message = err.to_string();
        match err {
            BalanceError::UnknownAsset(_) => Self::not_found("unknown_asset", message),
            BalanceError::InsufficientBalance { .. } => Self::conflict("insufficient_balance", message),
            BalanceError::InvalidAmount => Self::invalid("invalid_amount", message),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        let message = err.to_string();
        match err {
            ExchangeError::InvalidAmount => Self::invalid("invalid_amount", message),
            ExchangeError::InsufficientBalance { .. } => Self::conflict("insufficient_balance", message),
            ExchangeError::SameAsset => Self::invalid("same_asset", message),
            ExchangeError::ZeroPrice => Self::invalid("zero_price", message),
            ExchangeError::UnknownAsset(_) => Self::not_found("unknown_asset", message),
            ExchangeError::TransferInFlight => Self::conflict("transfer_in_flight", message),
        }
    }
}

impl From<WithdrawalError> for ApiError {
    fn from(err: WithdrawalError) -> Self {
        let message = err.to_string();
        match err {
            WithdrawalError::Invalid(issues) => {
                let list: Vec<Value> = issues
                    .iter()
                    .map(|i| json!({ "code": i, "message": i.to_string() }))
                    .collect();
                Self {
                    issues: Some(Value::Array(list)),
                    ..Self::invalid("validation_failed", message)
                }
            }
            WithdrawalError::UnknownAsset(_) => Self::not_found("unknown_asset", message),
            WithdrawalError::InFlight => Self::conflict("transfer_in_flight", message),
            WithdrawalError::Balance(e) => e.into(),
        }
    }
}

impl From<DepositError> for ApiError {
    fn from(err: DepositError) -> Self {
        let message = err.to_string();
        match err {
            DepositError::UnknownAsset(_) => Self::not_found("unknown_asset", message),
            DepositError::InvalidAmount => Self::invalid("invalid_amount", message),
        }
    }
}

impl From<PinError> for ApiError {
    fn from(err: PinError) -> Self {
        let message = err.to_string();
        match err {
            PinError::InvalidFormat => Self::invalid("invalid_pin_format", message),
            PinError::Mismatch => Self::invalid("pin_mismatch", message),
        }
    }
}

impl From<MiningError> for ApiError {
    fn from(err: MiningError) -> Self {
        let message = err.to_string();
        match err {
            MiningError::UnknownPlan(_) => Self::not_found("unknown_plan", message),
            MiningError::TermsNotAccepted => Self::invalid("terms_not_accepted", message),
            MiningError::InvalidAmount => Self::invalid("invalid_amount", message),
            MiningError::BelowMinimum { .. } => Self::invalid("below_minimum", message),
            MiningError::InsufficientBalance => Self::conflict("insufficient_balance", message),
            MiningError::NoSettlementAsset => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "no_settlement_asset", message)
            }
            MiningError::InFlight => Self::conflict("transfer_in_flight", message),
            MiningError::Balance(e) => e.into(),
        }
    }
}

impl From<OptionsError> for ApiError {
    fn from(err: OptionsError) -> Self {
        let message = err.to_string();
        match err {
            OptionsError::UnknownTimeframe(_) => Self::invalid("unknown_timeframe", message),
            OptionsError::InvalidAmount => Self::invalid("invalid_amount", message),
            OptionsError::BelowMinimum { .. } => Self::invalid("below_minimum", message),
            OptionsError::InsufficientBalance => Self::conflict("insufficient_balance", message),
            OptionsError::NoPrice(_) => Self::invalid("no_price", message),
            OptionsError::UnknownTrade(_) => Self::not_found("unknown_trade", message),
            OptionsError::NotExpired(_) => Self::conflict("not_expired", message),
            OptionsError::AlreadySettled(_) => Self::conflict("already_settled", message),
            OptionsError::NoSettlementAsset => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "no_settlement_asset", message)
            }
            OptionsError::InFlight => Self::conflict("transfer_in_flight", message),
            OptionsError::Balance(e) => e.into(),
        }
    }
}
