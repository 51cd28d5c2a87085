// =============================================================================
// Shared types used across the Aurora desk engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A wallet holding: balance plus the live USD mark used for conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub price_usd: f64,
}

impl Asset {
    pub fn new(id: &str, symbol: &str, name: &str, amount: f64, price_usd: f64) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            amount,
            price_usd,
        }
    }

    /// USD value of the holding at the current mark.
    pub fn value_usd(&self) -> f64 {
        self.amount * self.price_usd
    }
}

/// Which side of the exchange form the user is typing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveSide {
    From,
    To,
}

impl Default for ActiveSide {
    fn default() -> Self {
        Self::From
    }
}

impl std::fmt::Display for ActiveSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::From => write!(f, "from"),
            Self::To => write!(f, "to"),
        }
    }
}

/// `true` when `amount` is a usable non-negative number.
pub fn is_non_negative_finite(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// `true` when `price` can be used as a divisor or multiplier for a rate.
pub fn is_usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
