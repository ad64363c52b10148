//! # Error Module
//!
//! Domain errors raised by the pure types in this crate.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
///
/// These never touch storage; the business layer maps them onto its own
/// taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Money errors ===
    #[error("Insufficient available balance: need {needed}, available {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Insufficient reserved balance: need {needed}, reserved {reserved}")]
    InsufficientReserved { needed: Decimal, reserved: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Loan terms ===
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    #[error("Invalid interest rate: {0}")]
    InvalidRate(String),

    #[error("Invalid purpose: {0}")]
    InvalidPurpose(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    // === Status machines ===
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Unknown {field} value: {value}")]
    UnknownEnumValue { field: &'static str, value: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn unknown(field: &'static str, value: &str) -> Self {
        Self::UnknownEnumValue {
            field,
            value: value.to_string(),
        }
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientBalance { .. } | CoreError::InsufficientReserved { .. }
        )
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, CoreError::InvalidTransition { .. })
    }
}
