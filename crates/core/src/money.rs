//! # Money Module
//!
//! Currency definitions and minor-unit rounding. Amounts are carried as
//! `rust_decimal::Decimal` at full precision and only rounded when a value
//! is persisted.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency with a fixed number of minor-unit decimals.
///
/// # Examples
/// ```
/// use lendmarket_core::Currency;
///
/// let htg = Currency::htg();
/// assert_eq!(htg.decimals, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code
    pub code: String,
    /// Full name
    pub name: String,
    /// Minor-unit precision (HTG=2, USD=2, JPY=0)
    pub decimals: u8,
    /// Display symbol
    pub symbol: String,
}

impl Currency {
    pub fn new(code: &str, name: &str, decimals: u8, symbol: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: name.to_string(),
            decimals,
            symbol: symbol.to_string(),
        }
    }

    // === Preset currencies ===

    /// Haitian Gourde (2 decimals)
    pub fn htg() -> Self {
        Self::new("HTG", "Haitian Gourde", 2, "G")
    }

    /// US Dollar (2 decimals)
    pub fn usd() -> Self {
        Self::new("USD", "US Dollar", 2, "$")
    }

    /// Euro (2 decimals)
    pub fn eur() -> Self {
        Self::new("EUR", "Euro", 2, "€")
    }

    /// Look up a preset by code. Unknown codes fall back to two decimals.
    pub fn from_code(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "HTG" => Self::htg(),
            "USD" => Self::usd(),
            "EUR" => Self::eur(),
            other => Self::new(other, other, 2, other),
        }
    }

    /// Round an amount to this currency's minor units.
    pub fn round(&self, amount: Decimal) -> Decimal {
        round_minor(amount, self.decimals)
    }

    /// Smallest representable amount (0.01 for two decimals).
    pub fn minor_unit(&self) -> Decimal {
        Decimal::new(1, self.decimals as u32)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_minor(amount: Decimal, decimals: u8) -> Decimal {
    amount.round_dp_with_strategy(decimals as u32, RoundingStrategy::MidpointAwayFromZero)
}
