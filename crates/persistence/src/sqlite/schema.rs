//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! Schema is defined in migrations/20261019000000_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, NaiveDate, Utc};
use lendmarket_core::{
    LedgerEntry, Loan, LoanOffer, LoanRepayment, LoanStatus, OfferStatus, RepaymentStatus,
    TransactionStatus, TransactionType, Wallet,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row type for `wallets`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub available_balance: String, // Decimal stored as TEXT
    pub reserved_balance: String,  // Decimal stored as TEXT
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `loans`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LoanRow {
    pub id: String,
    pub borrower_id: String,
    pub lender_id: Option<String>,
    pub amount: String,
    pub currency: String,
    pub interest_rate: String,
    pub term_months: i64,
    pub purpose: String,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `loan_offers`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OfferRow {
    pub id: String,
    pub loan_id: String,
    pub lender_id: String,
    pub amount: String,
    pub interest_rate: String,
    pub notes: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `loan_repayments`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RepaymentRow {
    pub id: String,
    pub loan_id: String,
    pub installment_number: i64,
    pub due_date: NaiveDate,
    pub amount_due: String,
    pub principal_amount: String,
    pub interest_amount: String,
    pub amount_paid: String,
    pub status: String,
    pub payment_date: Option<NaiveDate>,
}

/// Row type for `transactions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: String,
    pub wallet_id: String,
    pub tx_type: String,
    pub amount: String,
    pub reference_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// === Conversion helpers ===

pub(crate) fn parse_decimal(value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value).map_err(|e| PersistenceError::InvalidDecimal(format!("{}: {}", value, e)))
}

fn parse_enum<T: FromStr>(field: &str, value: &str) -> PersistenceResult<T> {
    value
        .parse::<T>()
        .map_err(|_| PersistenceError::invalid_enum(field, value))
}

fn parse_u32(field: &str, value: i64) -> PersistenceResult<u32> {
    u32::try_from(value).map_err(|_| PersistenceError::invalid_enum(field, &value.to_string()))
}

impl TryFrom<WalletRow> for Wallet {
    type Error = PersistenceError;

    fn try_from(row: WalletRow) -> PersistenceResult<Self> {
        Ok(Wallet {
            available_balance: parse_decimal(&row.available_balance)?,
            reserved_balance: parse_decimal(&row.reserved_balance)?,
            id: row.id,
            user_id: row.user_id,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = PersistenceError;

    fn try_from(row: LoanRow) -> PersistenceResult<Self> {
        Ok(Loan {
            amount: parse_decimal(&row.amount)?,
            interest_rate: parse_decimal(&row.interest_rate)?,
            term_months: parse_u32("term_months", row.term_months)?,
            status: parse_enum::<LoanStatus>("loans.status", &row.status)?,
            id: row.id,
            borrower_id: row.borrower_id,
            lender_id: row.lender_id,
            currency: row.currency,
            purpose: row.purpose,
            start_date: row.start_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<OfferRow> for LoanOffer {
    type Error = PersistenceError;

    fn try_from(row: OfferRow) -> PersistenceResult<Self> {
        Ok(LoanOffer {
            amount: parse_decimal(&row.amount)?,
            interest_rate: parse_decimal(&row.interest_rate)?,
            status: parse_enum::<OfferStatus>("loan_offers.status", &row.status)?,
            id: row.id,
            loan_id: row.loan_id,
            lender_id: row.lender_id,
            notes: row.notes,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<RepaymentRow> for LoanRepayment {
    type Error = PersistenceError;

    fn try_from(row: RepaymentRow) -> PersistenceResult<Self> {
        Ok(LoanRepayment {
            installment_number: parse_u32("installment_number", row.installment_number)?,
            amount_due: parse_decimal(&row.amount_due)?,
            principal_amount: parse_decimal(&row.principal_amount)?,
            interest_amount: parse_decimal(&row.interest_amount)?,
            amount_paid: parse_decimal(&row.amount_paid)?,
            status: parse_enum::<RepaymentStatus>("loan_repayments.status", &row.status)?,
            id: row.id,
            loan_id: row.loan_id,
            due_date: row.due_date,
            payment_date: row.payment_date,
        })
    }
}

impl TryFrom<TransactionRow> for LedgerEntry {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> PersistenceResult<Self> {
        Ok(LedgerEntry {
            tx_type: parse_enum::<TransactionType>("transactions.tx_type", &row.tx_type)?,
            amount: parse_decimal(&row.amount)?,
            status: parse_enum::<TransactionStatus>("transactions.status", &row.status)?,
            id: row.id,
            wallet_id: row.wallet_id,
            reference_id: row.reference_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wallet_row_conversion() {
        let row = WalletRow {
            id: "WAL_1".into(),
            user_id: "alice".into(),
            currency: "HTG".into(),
            available_balance: "1500.25".into(),
            reserved_balance: "0".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let wallet = Wallet::try_from(row).unwrap();
        assert_eq!(wallet.available_balance, dec!(1500.25));
        assert_eq!(wallet.reserved_balance, dec!(0));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(matches!(
            parse_decimal("12,5"),
            Err(PersistenceError::InvalidDecimal(_))
        ));
        assert!(matches!(
            parse_enum::<LoanStatus>("loans.status", "open"),
            Err(PersistenceError::InvalidEnumValue { .. })
        ));
        assert!(parse_u32("term_months", -1).is_err());
    }
}
