//! # Ledger Entries
//!
//! Immutable, append-only audit records of every balance mutation. Summing a
//! wallet's entries by type reproduces its current balance fields.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// External funds in
    Deposit,
    /// External funds out
    Withdrawal,
    /// available -> reserved
    ReservedIncrease,
    /// reserved -> available
    ReservedDecrease,
    /// Lender side of settlement: reservation consumed
    LoanDisbursed,
    /// Borrower side of settlement
    LoanReceived,
    /// Borrower pays an installment
    Repayment,
    /// Lender receives an installment
    RepaymentReceived,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::ReservedIncrease => "reserved_increase",
            TransactionType::ReservedDecrease => "reserved_decrease",
            TransactionType::LoanDisbursed => "loan_disbursed",
            TransactionType::LoanReceived => "loan_received",
            TransactionType::Repayment => "repayment",
            TransactionType::RepaymentReceived => "repayment_received",
        }
    }

    /// Signed effect on `(available, reserved)` per unit of amount
    pub fn effect(&self) -> (i8, i8) {
        match self {
            TransactionType::Deposit => (1, 0),
            TransactionType::Withdrawal => (-1, 0),
            TransactionType::ReservedIncrease => (-1, 1),
            TransactionType::ReservedDecrease => (1, -1),
            TransactionType::LoanDisbursed => (0, -1),
            TransactionType::LoanReceived => (1, 0),
            TransactionType::Repayment => (-1, 0),
            TransactionType::RepaymentReceived => (1, 0),
        }
    }

    /// Whether the entry moves value across the platform boundary
    pub fn is_external(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Withdrawal)
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "reserved_increase" => Ok(TransactionType::ReservedIncrease),
            "reserved_decrease" => Ok(TransactionType::ReservedDecrease),
            "loan_disbursed" => Ok(TransactionType::LoanDisbursed),
            "loan_received" => Ok(TransactionType::LoanReceived),
            "repayment" => Ok(TransactionType::Repayment),
            "repayment_received" => Ok(TransactionType::RepaymentReceived),
            _ => Err(CoreError::unknown("transaction type", s)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            _ => Err(CoreError::unknown("transaction status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: TransactionType,
    /// Always positive; direction comes from `tx_type`
    pub amount: Decimal,
    /// Loan or offer this movement belongs to
    pub reference_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        id: String,
        wallet_id: &str,
        tx_type: TransactionType,
        amount: Decimal,
        reference_id: Option<&str>,
    ) -> Self {
        Self {
            id,
            wallet_id: wallet_id.to_string(),
            tx_type,
            amount,
            reference_id: reference_id.map(str::to_string),
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// Balances recomputed from ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reconciliation {
    pub available: Decimal,
    pub reserved: Decimal,
}

impl Reconciliation {
    pub fn matches(&self, available: Decimal, reserved: Decimal) -> bool {
        self.available == available && self.reserved == reserved
    }
}

/// Fold entries into the balances they imply.
pub fn reconcile<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Reconciliation {
    entries
        .into_iter()
        .fold(Reconciliation::default(), |mut acc, entry| {
            let (avail, reserved) = entry.tx_type.effect();
            acc.available += entry.amount * Decimal::from(avail);
            acc.reserved += entry.amount * Decimal::from(reserved);
            acc
        })
}
