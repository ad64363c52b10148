//! # Loan Module
//!
//! A borrower's funding request and its status machine.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loan status.
///
/// `requested` is the only state in which offers may be created, edited,
/// rejected or withdrawn. Settlement is the only writer that moves a loan
/// out of `requested` towards `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Requested,
    Active,
    Completed,
    Cancelled,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "requested",
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Cancelled => "cancelled",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    /// Single guarded transition table
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Requested, Active)
                | (Requested, Cancelled)
                | (Active, Completed)
                | (Active, Defaulted)
        )
    }

    pub fn transition(self, next: LoanStatus) -> CoreResult<LoanStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::invalid_transition("loan", self, next))
        }
    }

    /// Offers may only be created or changed while the loan is open
    pub fn accepts_offers(&self) -> bool {
        *self == LoanStatus::Requested
    }
}

impl FromStr for LoanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requested" => Ok(LoanStatus::Requested),
            "active" => Ok(LoanStatus::Active),
            "completed" => Ok(LoanStatus::Completed),
            "cancelled" => Ok(LoanStatus::Cancelled),
            "defaulted" => Ok(LoanStatus::Defaulted),
            _ => Err(CoreError::unknown("loan status", s)),
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub borrower_id: String,
    /// Set exactly once, by settlement
    pub lender_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    /// Annual rate in percent; the borrower's stated ceiling
    pub interest_rate: Decimal,
    pub term_months: u32,
    pub purpose: String,
    pub status: LoanStatus,
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_borrower(&self, user_id: &str) -> bool {
        self.borrower_id == user_id
    }

    pub fn is_lender(&self, user_id: &str) -> bool {
        self.lender_id.as_deref() == Some(user_id)
    }
}

/// Validated input for a new loan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub amount: Decimal,
    pub currency: String,
    pub interest_rate: Decimal,
    pub term_months: u32,
    pub purpose: String,
}

impl NewLoan {
    pub fn validate(&self, max_term_months: u32) -> CoreResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "loan amount must be positive: {}",
                self.amount
            )));
        }
        if self.term_months == 0 || self.term_months > max_term_months {
            return Err(CoreError::InvalidTerm(format!(
                "term must be between 1 and {} months, got {}",
                max_term_months, self.term_months
            )));
        }
        validate_rate(self.interest_rate)?;
        if self.purpose.trim().is_empty() {
            return Err(CoreError::InvalidPurpose("purpose must not be empty".into()));
        }
        Ok(())
    }

    /// Build the `requested` loan row
    pub fn into_loan(self, id: String, borrower_id: String) -> Loan {
        let now = Utc::now();
        Loan {
            id,
            borrower_id,
            lender_id: None,
            amount: self.amount,
            currency: self.currency.to_uppercase(),
            interest_rate: self.interest_rate,
            term_months: self.term_months,
            purpose: self.purpose.trim().to_string(),
            status: LoanStatus::Requested,
            start_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Annual percentage rate must lie in `[0, 100]`.
pub fn validate_rate(rate: Decimal) -> CoreResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(CoreError::InvalidRate(format!(
            "annual rate must be between 0 and 100 percent, got {}",
            rate
        )));
    }
    Ok(())
}
