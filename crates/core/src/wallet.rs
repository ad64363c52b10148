//! # Wallet Module
//!
//! A wallet holds one user's funds in one currency, split into an
//! `available_balance` and a `reserved_balance` earmarked for pending offers.
//!
//! The methods here mutate an in-memory copy only; the ledger service loads a
//! locked row, applies one of these operations and writes the result back in
//! the same transaction.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet ID (WAL_...)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Currency code
    pub currency: String,
    /// Spendable funds
    pub available_balance: Decimal,
    /// Funds promised against pending offers
    pub reserved_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet
    pub fn new(id: String, user_id: String, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            currency,
            available_balance: Decimal::ZERO,
            reserved_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total economic claim (available + reserved)
    pub fn total(&self) -> Decimal {
        self.available_balance + self.reserved_balance
    }

    pub fn can_spend(&self, amount: Decimal) -> bool {
        self.available_balance >= amount
    }

    /// Move `amount` from available to reserved.
    pub fn reserve(&mut self, amount: Decimal) -> CoreResult<()> {
        ensure_positive(amount)?;
        if !self.can_spend(amount) {
            return Err(CoreError::InsufficientBalance {
                needed: amount,
                available: self.available_balance,
            });
        }
        self.available_balance -= amount;
        self.reserved_balance += amount;
        self.touch();
        Ok(())
    }

    /// Move up to `amount` from reserved back to available.
    ///
    /// Clamps at the current reservation and returns the amount actually
    /// released, so callers can log the real movement.
    pub fn release(&mut self, amount: Decimal) -> CoreResult<Decimal> {
        ensure_positive(amount)?;
        let released = amount.min(self.reserved_balance);
        self.reserved_balance -= released;
        self.available_balance += released;
        self.touch();
        Ok(released)
    }

    /// Convert part of the reservation into a permanent debit. Available
    /// balance is untouched.
    pub fn consume_reserved(&mut self, amount: Decimal) -> CoreResult<()> {
        ensure_positive(amount)?;
        if self.reserved_balance < amount {
            return Err(CoreError::InsufficientReserved {
                needed: amount,
                reserved: self.reserved_balance,
            });
        }
        self.reserved_balance -= amount;
        self.touch();
        Ok(())
    }

    /// Add to available
    pub fn credit(&mut self, amount: Decimal) -> CoreResult<()> {
        ensure_positive(amount)?;
        self.available_balance += amount;
        self.touch();
        Ok(())
    }

    /// Subtract from available
    pub fn debit(&mut self, amount: Decimal) -> CoreResult<()> {
        ensure_positive(amount)?;
        if !self.can_spend(amount) {
            return Err(CoreError::InsufficientBalance {
                needed: amount,
                available: self.available_balance,
            });
        }
        self.available_balance -= amount;
        self.touch();
        Ok(())
    }

    /// Both balance fields are non-negative
    pub fn is_consistent(&self) -> bool {
        self.available_balance >= Decimal::ZERO && self.reserved_balance >= Decimal::ZERO
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reserved_balance > Decimal::ZERO {
            write!(
                f,
                "{} {} (reserved: {})",
                self.available_balance, self.currency, self.reserved_balance
            )
        } else {
            write!(f, "{} {}", self.available_balance, self.currency)
        }
    }
}

fn ensure_positive(amount: Decimal) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "amount must be positive: {}",
            amount
        )));
    }
    Ok(())
}
