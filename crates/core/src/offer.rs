//! # Offer Module
//!
//! A lender's conditional commitment against a loan request.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Withdrawn => "withdrawn",
        }
    }

    /// Every transition leaves `pending`; all other states are closed.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        *self == OfferStatus::Pending && next != OfferStatus::Pending
    }

    pub fn transition(self, next: OfferStatus) -> CoreResult<OfferStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::invalid_transition("offer", self, next))
        }
    }

    /// The lender's funds are still reserved for this offer
    pub fn holds_reservation(&self) -> bool {
        *self == OfferStatus::Pending
    }
}

impl FromStr for OfferStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OfferStatus::Pending),
            "accepted" => Ok(OfferStatus::Accepted),
            "rejected" => Ok(OfferStatus::Rejected),
            "withdrawn" => Ok(OfferStatus::Withdrawn),
            _ => Err(CoreError::unknown("offer status", s)),
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub id: String,
    pub loan_id: String,
    pub lender_id: String,
    /// Never above the loan amount
    pub amount: Decimal,
    /// Annual rate in percent
    pub interest_rate: Decimal,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanOffer {
    pub fn new(
        id: String,
        loan_id: String,
        lender_id: String,
        amount: Decimal,
        interest_rate: Decimal,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            loan_id,
            lender_id,
            amount,
            interest_rate,
            notes,
            status: OfferStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }

    /// Positive when the edit needs more funds reserved, negative when
    /// funds go back to the lender.
    pub fn amount_delta(&self, new_amount: Decimal) -> Decimal {
        new_amount - self.amount
    }

    /// Whether the offer rate exceeds the borrower's ceiling. Informational
    /// only, never enforced.
    pub fn exceeds_ceiling(&self, ceiling: Decimal) -> bool {
        self.interest_rate > ceiling
    }
}
