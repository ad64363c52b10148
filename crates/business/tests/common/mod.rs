#![allow(dead_code)]

use chrono::NaiveDate;
use lendmarket_business::{
    ChannelNotifier, MarketContext, MarketSettings, OfferLifecycle, OfferTerms, WalletLedger,
};
use lendmarket_core::{Loan, LoanOffer, NewLoan, Notification, NotificationKind, Wallet};
use lendmarket_persistence::Database;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const BORROWER: &str = "bob";
pub const LENDER_A: &str = "alice";
pub const LENDER_B: &str = "carol";

pub struct Harness {
    pub ctx: MarketContext,
    pub db: Database,
    pub notifications: UnboundedReceiver<Notification>,
    pub dir: TempDir,
}

pub async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let db = Database::in_memory(dir.path().join("activity")).await.unwrap();
    let (notifier, notifications) = ChannelNotifier::new();
    let ctx = MarketContext::new(&db, Arc::new(notifier), MarketSettings::default());
    Harness {
        ctx,
        db,
        notifications,
        dir,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn start_date() -> NaiveDate {
    date(2026, 10, 19)
}

pub fn terms(amount: Decimal, rate: Decimal) -> OfferTerms {
    OfferTerms {
        amount,
        interest_rate: rate,
        notes: None,
    }
}

impl Harness {
    pub async fn fund(&self, user: &str, amount: Decimal) -> Wallet {
        WalletLedger::new(&self.ctx).deposit(user, "HTG", amount).await.unwrap()
    }

    pub async fn wallet(&self, user: &str) -> Wallet {
        WalletLedger::new(&self.ctx).wallet(user, "HTG").await.unwrap()
    }

    pub async fn request(&self, amount: Decimal, rate: Decimal, term_months: u32) -> Loan {
        OfferLifecycle::new(&self.ctx)
            .request_loan(
                BORROWER,
                NewLoan {
                    amount,
                    currency: "HTG".into(),
                    interest_rate: rate,
                    term_months,
                    purpose: "Shop inventory".into(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn offer(&self, lender: &str, loan_id: &str, amount: Decimal, rate: Decimal) -> LoanOffer {
        OfferLifecycle::new(&self.ctx)
            .create_offer(lender, loan_id, terms(amount, rate))
            .await
            .unwrap()
    }

    pub async fn has_wallet(&self, user: &str) -> bool {
        WalletLedger::new(&self.ctx).wallet(user, "HTG").await.is_ok()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }

    pub fn drain_kinds(&mut self) -> Vec<NotificationKind> {
        self.drain().into_iter().map(|n| n.kind).collect()
    }

    /// Sum of available + reserved across all HTG wallets
    pub async fn total(&self) -> Decimal {
        WalletLedger::new(&self.ctx).total_value("HTG").await.unwrap()
    }

    /// Every wallet non-negative and matching its ledger
    pub async fn assert_books_balance(&self) {
        let ledger = WalletLedger::new(&self.ctx);
        for user in [BORROWER, LENDER_A, LENDER_B] {
            for wallet in ledger.wallets(user).await.unwrap() {
                assert!(wallet.available_balance >= Decimal::ZERO, "{:?}", wallet);
                assert!(wallet.reserved_balance >= Decimal::ZERO, "{:?}", wallet);
                let report = ledger.reconcile(&wallet.id).await.unwrap();
                assert!(report.is_balanced(), "drift on {}: {:?}", wallet.id, report.drift());
            }
        }
    }
}
