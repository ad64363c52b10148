//! Business layer errors
//!
//! Every service returns [`MarketError`]. Storage text stays in `Display`
//! for logs; [`MarketError::user_message`] is what a caller shows a user.

use lendmarket_core::CoreError;
use lendmarket_persistence::PersistenceError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    // === Rejected before any transaction opens ===
    #[error("Validation failed: {0}")]
    Validation(String),

    // === Domain failures ===
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Installment #{installment} of loan {loan_id} is already paid")]
    AlreadyPaid { loan_id: String, installment: u32 },

    #[error("Settlement failed: {0}")]
    SettlementFailed(#[source] Box<MarketError>),

    // === Infrastructure ===
    #[error("Timed out waiting for a database lock")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(action: &str) -> Self {
        Self::Forbidden(action.to_string())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidStateTransition(message.into())
    }

    /// Wrap a failure that happened mid-settlement. Never nests.
    pub fn settlement_failed(inner: MarketError) -> Self {
        match inner {
            wrapped @ MarketError::SettlementFailed(_) => wrapped,
            other => MarketError::SettlementFailed(Box::new(other)),
        }
    }

    /// Safe to call the same operation again: nothing was committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Timeout | MarketError::SettlementFailed(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "VALIDATION",
            MarketError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            MarketError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            MarketError::NotFound { .. } => "NOT_FOUND",
            MarketError::Forbidden(_) => "FORBIDDEN",
            MarketError::AlreadyPaid { .. } => "ALREADY_PAID",
            MarketError::SettlementFailed(_) => "SETTLEMENT_FAILED",
            MarketError::Timeout => "TIMEOUT",
            MarketError::Storage(_) => "STORAGE",
        }
    }

    /// Message safe to show an end user.
    pub fn user_message(&self) -> String {
        match self {
            MarketError::Validation(msg) => msg.clone(),
            MarketError::InsufficientFunds {
                required,
                available,
            } => format!(
                "Insufficient funds: this needs {} but only {} is available",
                required, available
            ),
            MarketError::InvalidStateTransition(msg) => {
                format!("This action is not allowed in the current state ({})", msg)
            }
            MarketError::NotFound { entity, id } => format!("{} {} was not found", entity, id),
            MarketError::Forbidden(action) => format!("You are not allowed to {}", action),
            MarketError::AlreadyPaid { installment, .. } => {
                format!("Installment #{} is already paid", installment)
            }
            MarketError::SettlementFailed(inner) => format!(
                "The offer could not be accepted: {}. No funds were moved, you can retry",
                inner.user_message()
            ),
            MarketError::Timeout => "The system is busy right now, please retry".to_string(),
            MarketError::Storage(_) => {
                "An internal error occurred and no changes were made".to_string()
            }
        }
    }
}

impl From<PersistenceError> for MarketError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => MarketError::NotFound { entity, id },
            ref e if e.is_busy() => MarketError::Timeout,
            other => MarketError::Storage(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::from(err).into()
    }
}

impl From<CoreError> for MarketError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientBalance { needed, available } => {
                MarketError::insufficient_funds(needed, available)
            }
            CoreError::InsufficientReserved { needed, reserved } => {
                MarketError::insufficient_funds(needed, reserved)
            }
            CoreError::InvalidAmount(msg)
            | CoreError::InvalidTerm(msg)
            | CoreError::InvalidRate(msg)
            | CoreError::InvalidPurpose(msg)
            | CoreError::InvalidDate(msg) => MarketError::Validation(msg),
            e @ CoreError::InvalidTransition { .. } => {
                MarketError::InvalidStateTransition(e.to_string())
            }
            e @ CoreError::UnknownEnumValue { .. } => MarketError::Validation(e.to_string()),
        }
    }
}
