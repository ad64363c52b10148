//! # Repayment Module
//!
//! Persisted installments and their payment state.

use crate::amortization::Installment;
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stored installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentStatus {
    Pending,
    Paid,
    Late,
}

impl RepaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentStatus::Pending => "pending",
            RepaymentStatus::Paid => "paid",
            RepaymentStatus::Late => "late",
        }
    }

    pub fn can_transition_to(&self, next: RepaymentStatus) -> bool {
        use RepaymentStatus::*;
        matches!((self, next), (Pending, Paid) | (Pending, Late) | (Late, Paid))
    }

    pub fn transition(self, next: RepaymentStatus) -> CoreResult<RepaymentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::invalid_transition("installment", self, next))
        }
    }
}

impl FromStr for RepaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RepaymentStatus::Pending),
            "paid" => Ok(RepaymentStatus::Paid),
            "late" => Ok(RepaymentStatus::Late),
            _ => Err(CoreError::unknown("repayment status", s)),
        }
    }
}

impl fmt::Display for RepaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display state derived on read. `Overdue` is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentState {
    Pending,
    Paid,
    Late,
    Overdue,
}

impl InstallmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentState::Pending => "pending",
            InstallmentState::Paid => "paid",
            InstallmentState::Late => "late",
            InstallmentState::Overdue => "overdue",
        }
    }
}

impl fmt::Display for InstallmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: String,
    pub loan_id: String,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    pub amount_paid: Decimal,
    pub status: RepaymentStatus,
    pub payment_date: Option<NaiveDate>,
}

impl LoanRepayment {
    pub fn from_installment(id: String, loan_id: &str, installment: &Installment) -> Self {
        Self {
            id,
            loan_id: loan_id.to_string(),
            installment_number: installment.number,
            due_date: installment.due_date,
            amount_due: installment.amount_due,
            principal_amount: installment.principal,
            interest_amount: installment.interest,
            amount_paid: Decimal::ZERO,
            status: RepaymentStatus::Pending,
            payment_date: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == RepaymentStatus::Paid
    }

    /// Amount still owed on this installment (never negative)
    pub fn outstanding(&self) -> Decimal {
        (self.amount_due - self.amount_paid).max(Decimal::ZERO)
    }

    /// Add a payment. Returns `true` when this payment settles the
    /// installment.
    pub fn apply_payment(&mut self, amount: Decimal, payment_date: NaiveDate) -> CoreResult<bool> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "payment must be positive: {}",
                amount
            )));
        }
        if self.is_paid() {
            return Err(CoreError::invalid_transition(
                "installment",
                self.status,
                RepaymentStatus::Paid,
            ));
        }

        self.amount_paid += amount;
        if self.amount_paid >= self.amount_due {
            self.status = self.status.transition(RepaymentStatus::Paid)?;
            self.payment_date = Some(payment_date);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn mark_late(&mut self) -> CoreResult<()> {
        self.status = self.status.transition(RepaymentStatus::Late)?;
        Ok(())
    }

    /// Display state as of `today`
    pub fn state_on(&self, today: NaiveDate) -> InstallmentState {
        match self.status {
            RepaymentStatus::Paid => InstallmentState::Paid,
            RepaymentStatus::Late => InstallmentState::Late,
            RepaymentStatus::Pending if self.due_date < today => InstallmentState::Overdue,
            RepaymentStatus::Pending => InstallmentState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn installment() -> LoanRepayment {
        let inst = Installment {
            number: 1,
            due_date: date(2026, 2, 1),
            amount_due: dec!(100),
            principal: dec!(90),
            interest: dec!(10),
            remaining_balance: dec!(910),
        };
        LoanRepayment::from_installment("RPY_1".into(), "LOAN_1", &inst)
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut r = installment();
        assert!(!r.apply_payment(dec!(40), date(2026, 1, 20)).unwrap());
        assert_eq!(r.status, RepaymentStatus::Pending);
        assert_eq!(r.outstanding(), dec!(60));
        assert!(r.payment_date.is_none());

        assert!(r.apply_payment(dec!(60), date(2026, 1, 25)).unwrap());
        assert_eq!(r.status, RepaymentStatus::Paid);
        assert_eq!(r.payment_date, Some(date(2026, 1, 25)));
        assert_eq!(r.outstanding(), dec!(0));
    }

    #[test]
    fn test_paid_installment_rejects_payment() {
        let mut r = installment();
        r.apply_payment(dec!(100), date(2026, 1, 20)).unwrap();
        assert!(r.apply_payment(dec!(1), date(2026, 1, 21)).is_err());
        assert_eq!(r.amount_paid, dec!(100));
    }

    #[test]
    fn test_late_can_still_be_paid() {
        let mut r = installment();
        r.mark_late().unwrap();
        assert!(r.mark_late().is_err());
        assert!(r.apply_payment(dec!(100), date(2026, 3, 1)).unwrap());
        assert_eq!(r.status, RepaymentStatus::Paid);
    }

    #[test]
    fn test_overdue_is_derived() {
        let r = installment();
        assert_eq!(r.state_on(date(2026, 2, 1)), InstallmentState::Pending);
        assert_eq!(r.state_on(date(2026, 2, 2)), InstallmentState::Overdue);
        // stored status untouched
        assert_eq!(r.status, RepaymentStatus::Pending);
    }
}
