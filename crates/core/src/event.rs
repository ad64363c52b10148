//! # Event Module
//!
//! Outbound side-channel records: user notifications and the activity log.
//! Both are produced after a state transition commits and neither can undo
//! it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OfferCreated,
    OfferAccepted,
    OfferRejected,
    OfferWithdrawn,
    LoanFunded,
    LoanCancelled,
    PaymentDue,
    PaymentReceived,
    LoanCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OfferCreated => "offer_created",
            NotificationKind::OfferAccepted => "offer_accepted",
            NotificationKind::OfferRejected => "offer_rejected",
            NotificationKind::OfferWithdrawn => "offer_withdrawn",
            NotificationKind::LoanFunded => "loan_funded",
            NotificationKind::LoanCancelled => "loan_cancelled",
            NotificationKind::PaymentDue => "payment_due",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::LoanCompleted => "loan_completed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fire-and-forget message for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub reference_id: String,
}

impl Notification {
    pub fn new(
        user_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        reference_id: &str,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            reference_id: reference_id.to_string(),
        }
    }

    // === Builders ===

    pub fn offer_created(borrower_id: &str, offer_id: &str, amount: Decimal, rate: Decimal) -> Self {
        Self::new(
            borrower_id,
            NotificationKind::OfferCreated,
            "New loan offer",
            format!("You received an offer of {} at {}% per year", amount, rate),
            offer_id,
        )
    }

    pub fn offer_accepted(lender_id: &str, offer_id: &str, amount: Decimal) -> Self {
        Self::new(
            lender_id,
            NotificationKind::OfferAccepted,
            "Offer accepted",
            format!("Your offer of {} was accepted and the funds were disbursed", amount),
            offer_id,
        )
    }

    pub fn offer_rejected(lender_id: &str, offer_id: &str, reason: &str) -> Self {
        Self::new(
            lender_id,
            NotificationKind::OfferRejected,
            "Offer not accepted",
            format!("Your offer was rejected: {}. Reserved funds were released", reason),
            offer_id,
        )
    }

    pub fn offer_withdrawn(borrower_id: &str, offer_id: &str) -> Self {
        Self::new(
            borrower_id,
            NotificationKind::OfferWithdrawn,
            "Offer withdrawn",
            "A lender withdrew their offer on your loan request",
            offer_id,
        )
    }

    pub fn loan_funded(borrower_id: &str, loan_id: &str, amount: Decimal) -> Self {
        Self::new(
            borrower_id,
            NotificationKind::LoanFunded,
            "Loan funded",
            format!("{} was credited to your wallet", amount),
            loan_id,
        )
    }

    pub fn loan_cancelled(lender_id: &str, loan_id: &str) -> Self {
        Self::new(
            lender_id,
            NotificationKind::LoanCancelled,
            "Loan request cancelled",
            "The borrower cancelled the request. Reserved funds were released",
            loan_id,
        )
    }

    pub fn payment_due(borrower_id: &str, loan_id: &str, amount: Decimal, due: chrono::NaiveDate) -> Self {
        Self::new(
            borrower_id,
            NotificationKind::PaymentDue,
            "Payment due",
            format!("Installment of {} is due on {}", amount, due),
            loan_id,
        )
    }

    pub fn payment_received(lender_id: &str, loan_id: &str, amount: Decimal, installment: u32) -> Self {
        Self::new(
            lender_id,
            NotificationKind::PaymentReceived,
            "Payment received",
            format!("Received {} for installment #{}", amount, installment),
            loan_id,
        )
    }

    pub fn loan_completed(user_id: &str, loan_id: &str) -> Self {
        Self::new(
            user_id,
            NotificationKind::LoanCompleted,
            "Loan completed",
            "All installments have been paid",
            loan_id,
        )
    }
}

/// One activity log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Assigned by the store (ACT_000001, ...)
    #[serde(default)]
    pub record_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action: String,
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ActivityRecord {
    pub fn new(user_id: &str, action: &str, reference_id: &str) -> Self {
        Self {
            record_id: String::new(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            action: action.to_string(),
            reference_id: reference_id.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_notification_builders() {
        let n = Notification::offer_created("bob", "OFR_1", dec!(5000), dec!(8));
        assert_eq!(n.user_id, "bob");
        assert_eq!(n.kind, NotificationKind::OfferCreated);
        assert!(n.message.contains("5000"));
        assert_eq!(n.reference_id, "OFR_1");
    }

    #[test]
    fn test_activity_serialization_skips_null_metadata() {
        let rec = ActivityRecord::new("alice", "offer_created", "OFR_1");
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("metadata"));

        let rec = rec.with_metadata(serde_json::json!({"amount": "100"}));
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: ActivityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.metadata["amount"], "100");
        assert_eq!(parsed.action, "offer_created");
    }
}
