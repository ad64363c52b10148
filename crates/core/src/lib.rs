//! # Lendmarket Core
//!
//! Domain types for the loan marketplace: wallets with reserved funds, loan
//! requests, competing offers, repayment installments and the amortization
//! calculator. Nothing in this crate performs I/O.
//!
//! ## Status machines
//!
//! ```text
//! Loan:   requested ──► active ──► completed
//!             │            └─────► defaulted
//!             └──► cancelled
//!
//! Offer:  pending ──► accepted | rejected | withdrawn
//!
//! Installment: pending ──► paid
//!                 └──► late ──► paid
//! ```

pub mod amortization;
pub mod error;
pub mod event;
pub mod ledger;
pub mod loan;
pub mod money;
pub mod offer;
pub mod repayment;
pub mod wallet;

pub use amortization::{monthly_payment, schedule, Installment};
pub use error::{CoreError, CoreResult};
pub use event::{ActivityRecord, Notification, NotificationKind};
pub use ledger::{reconcile, LedgerEntry, Reconciliation, TransactionStatus, TransactionType};
pub use loan::{Loan, LoanStatus, NewLoan};
pub use money::{round_minor, Currency};
pub use offer::{LoanOffer, OfferStatus};
pub use repayment::{InstallmentState, LoanRepayment, RepaymentStatus};
pub use wallet::Wallet;

/// Generate a prefixed unique identifier, e.g. `LOAN_3f2a...`.
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
