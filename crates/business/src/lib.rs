//! # Lendmarket Business
//!
//! Services over the persistence layer. Each takes the acting user's id
//! explicitly and authorizes against it.
//!
//! | Service | Operations |
//! |---|---|
//! | [`WalletLedger`] | deposit, withdraw, reserve, release, settle, reconcile |
//! | [`OfferLifecycle`] | request loan, create/edit/reject/withdraw offer, cancel, default |
//! | [`SettlementCoordinator`] | accept an offer |
//! | [`RepaymentTracker`] | record payment, mark late, schedule view |

pub mod context;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod repayment;
pub mod settlement;

pub use context::{MarketContext, MarketSettings, SideEffects};
pub use error::{MarketError, MarketResult};
pub use ledger::{ReconciliationReport, WalletLedger};
pub use lifecycle::{OfferLifecycle, OfferTerms};
pub use notify::{ChannelNotifier, Notifier, NotifyError, TracingNotifier};
pub use repayment::{InstallmentView, PaymentReceipt, RepaymentTracker, ScheduleSummary, ScheduleView};
pub use settlement::{Settlement, SettlementCoordinator};
