// =============================================================================
// Exchange Calculator — cross-rate quotes and atomic asset conversion
// =============================================================================
//
// rate = from.price_usd / to.price_usd
//
// Quoting is a pure function of two assets. Executing re-reads both assets
// from the balance store inside the in-flight critical section and converts
// at the rate observed *there*, not at whatever rate the caller was last
// shown. A price tick between quote and execute therefore changes the fill.
// =============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::balance_store::{BalanceError, BalanceStore};
use crate::types::{is_non_negative_finite, is_usable_price, ActiveSide, Asset};

/// Fractional digits shown in the exchange form.
pub const DISPLAY_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    #[error("please enter a valid amount")]
    InvalidAmount,
    #[error("insufficient {symbol} balance")]
    InsufficientBalance { symbol: String },
    #[error("source and destination asset are the same")]
    SameAsset,
    #[error("asset price is zero or unavailable")]
    ZeroPrice,
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    #[error("another exchange is already being processed")]
    TransferInFlight,
}

impl From<BalanceError> for ExchangeError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::UnknownAsset(id) => Self::UnknownAsset(id),
            BalanceError::InsufficientBalance { symbol, .. } => Self::InsufficientBalance { symbol },
            BalanceError::InvalidAmount => Self::InvalidAmount,
        }
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// Non-committing conversion preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub from_amount: f64,
    pub to_amount: f64,
    pub rate: f64,
}

impl ExchangeQuote {
    /// The zero quote returned when no conversion is possible.
    pub fn unconvertible() -> Self {
        Self {
            from_amount: 0.0,
            to_amount: 0.0,
            rate: 0.0,
        }
    }

    pub fn is_convertible(&self) -> bool {
        self.rate > 0.0
    }

    pub fn from_display(&self) -> String {
        format_display(self.from_amount)
    }

    pub fn to_display(&self) -> String {
        format_display(self.to_amount)
    }
}

/// Cross rate between two assets, or `ZeroPrice` if either mark is unusable.
pub fn cross_rate(from: &Asset, to: &Asset) -> Result<f64, ExchangeError> {
    if !is_usable_price(from.price_usd) || !is_usable_price(to.price_usd) {
        return Err(ExchangeError::ZeroPrice);
    }
    let rate = from.price_usd / to.price_usd;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ExchangeError::ZeroPrice);
    }
    Ok(rate)
}

/// Convert `amount` entered on `active_side`, reporting why it failed.
pub fn try_quote(
    from: &Asset,
    to: &Asset,
    amount: f64,
    active_side: ActiveSide,
) -> Result<ExchangeQuote, ExchangeError> {
    let rate = cross_rate(from, to)?;
    if !is_non_negative_finite(amount) {
        return Err(ExchangeError::InvalidAmount);
    }

    let quote = match active_side {
        ActiveSide::From => ExchangeQuote {
            from_amount: amount,
            to_amount: amount * rate,
            rate,
        },
        ActiveSide::To => ExchangeQuote {
            from_amount: amount / rate,
            to_amount: amount,
            rate,
        },
    };
    Ok(quote)
}

/// Convert `amount` entered on `active_side`. Any failure collapses to
/// [`ExchangeQuote::unconvertible`].
pub fn quote(from: &Asset, to: &Asset, amount: f64, active_side: ActiveSide) -> ExchangeQuote {
    try_quote(from, to, amount, active_side).unwrap_or_else(|_| ExchangeQuote::unconvertible())
}

/// Round to [`DISPLAY_DECIMALS`] and strip trailing zeros and a dangling dot.
pub fn format_display(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let fixed = format!("{:.*}", DISPLAY_DECIMALS, value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        s => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Balances of the two touched assets after a committed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFill {
    pub new_from_amount: f64,
    pub new_to_amount: f64,
    pub from_amount: f64,
    pub to_amount: f64,
    pub rate: f64,
}

/// Quotes and executes conversions against one balance store.
pub struct ExchangeCalculator<S: BalanceStore + ?Sized> {
    store: Arc<S>,
}

impl<S: BalanceStore + ?Sized> ExchangeCalculator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Quote between two stored assets by id using their current marks.
    pub fn quote_ids(
        &self,
        from_id: &str,
        to_id: &str,
        amount: f64,
        active_side: ActiveSide,
    ) -> Result<ExchangeQuote, ExchangeError> {
        let from = self
            .store
            .get_asset(from_id)
            .ok_or_else(|| ExchangeError::UnknownAsset(from_id.to_string()))?;
        let to = self
            .store
            .get_asset(to_id)
            .ok_or_else(|| ExchangeError::UnknownAsset(to_id.to_string()))?;
        try_quote(&from, &to, amount, active_side)
    }

    /// Convert `from_amount` of `from_id` into `to_id` at the live rate.
    ///
    /// Validation happens entirely before the single `commit_transfer`
    /// call, so a rejected exchange leaves every balance untouched.
    pub fn execute(
        &self,
        from_id: &str,
        to_id: &str,
        from_amount: f64,
    ) -> Result<ExchangeFill, ExchangeError> {
        let _guard = self.store.in_flight().try_acquire().ok_or_else(|| {
            warn!(from = %from_id, to = %to_id, "exchange rejected: transfer in flight");
            ExchangeError::TransferInFlight
        })?;

        let from = self
            .store
            .get_asset(from_id)
            .ok_or_else(|| ExchangeError::UnknownAsset(from_id.to_string()))?;
        let to = self
            .store
            .get_asset(to_id)
            .ok_or_else(|| ExchangeError::UnknownAsset(to_id.to_string()))?;

        if from.symbol.eq_ignore_ascii_case(&to.symbol) {
            return Err(ExchangeError::SameAsset);
        }
        if !from_amount.is_finite() || from_amount <= 0.0 {
            return Err(ExchangeError::InvalidAmount);
        }
        let rate = cross_rate(&from, &to)?;
        if from_amount > from.amount {
            warn!(
                symbol = %from.symbol,
                available = from.amount,
                requested = from_amount,
                "exchange rejected: insufficient balance"
            );
            return Err(ExchangeError::InsufficientBalance {
                symbol: from.symbol.clone(),
            });
        }

        let to_amount = from_amount * rate;
        let (new_from_amount, new_to_amount) =
            self.store.commit_transfer(&from.id, &to.id, from_amount, to_amount)?;

        let fill = ExchangeFill {
            new_from_amount,
            new_to_amount,
            from_amount,
            to_amount,
            rate,
        };

        info!(
            from = %from.symbol,
            to = %to.symbol,
            from_amount,
            to_amount,
            rate,
            "exchange executed"
        );
        Ok(fill)
    }
}
