//! Races against a file-backed database with a multi-connection pool.

mod common;

use common::{date, terms, BORROWER, LENDER_A, LENDER_B};
use lendmarket_business::{
    MarketContext, MarketError, MarketSettings, OfferLifecycle, SettlementCoordinator, WalletLedger,
};
use lendmarket_core::{Loan, LoanOffer, LoanStatus, NewLoan, OfferStatus};
use lendmarket_persistence::{Database, PoolSettings};
use rust_decimal_macros::dec;
use tempfile::TempDir;

async fn file_context(dir: &TempDir) -> (Database, MarketContext) {
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("market.db").display());
    let db = Database::open(&url, dir.path().join("activity"), &PoolSettings::default())
        .await
        .unwrap();
    let ctx = MarketContext::with_tracing(&db, MarketSettings::default());
    (db, ctx)
}

/// Both lenders funded with 5000, one 5000 request, offers of 5000 and 4500.
async fn open_request(ctx: &MarketContext) -> (Loan, LoanOffer, LoanOffer) {
    let ledger = WalletLedger::new(ctx);
    ledger.deposit(LENDER_A, "HTG", dec!(5000)).await.unwrap();
    ledger.deposit(LENDER_B, "HTG", dec!(5000)).await.unwrap();

    let lifecycle = OfferLifecycle::new(ctx);
    let loan = lifecycle
        .request_loan(
            BORROWER,
            NewLoan {
                amount: dec!(5000),
                currency: "HTG".into(),
                interest_rate: dec!(10),
                term_months: 6,
                purpose: "Inventory".into(),
            },
        )
        .await
        .unwrap();
    let offer_a = lifecycle
        .create_offer(LENDER_A, &loan.id, terms(dec!(5000), dec!(8)))
        .await
        .unwrap();
    let offer_b = lifecycle
        .create_offer(LENDER_B, &loan.id, terms(dec!(4500), dec!(7)))
        .await
        .unwrap();
    (loan, offer_a, offer_b)
}

async fn assert_no_reservations_left(ctx: &MarketContext) {
    let ledger = WalletLedger::new(ctx);
    for user in [LENDER_A, LENDER_B] {
        let wallet = ledger.wallet(user, "HTG").await.unwrap();
        assert_eq!(wallet.reserved_balance, dec!(0), "{}", user);
        assert!(ledger.reconcile(&wallet.id).await.unwrap().is_balanced());
    }
    assert_eq!(ledger.total_value("HTG").await.unwrap(), dec!(10000));
}

#[tokio::test]
async fn test_concurrent_acceptances_fund_once() {
    let dir = TempDir::new().unwrap();
    let (_db, ctx) = file_context(&dir).await;
    let ledger = WalletLedger::new(&ctx);
    ledger.deposit(LENDER_A, "HTG", dec!(5000)).await.unwrap();
    ledger.deposit(LENDER_B, "HTG", dec!(5000)).await.unwrap();

    let lifecycle = OfferLifecycle::new(&ctx);
    let loan = lifecycle
        .request_loan(
            BORROWER,
            NewLoan {
                amount: dec!(5000),
                currency: "HTG".into(),
                interest_rate: dec!(10),
                term_months: 6,
                purpose: "Inventory".into(),
            },
        )
        .await
        .unwrap();
    let offer_a = lifecycle
        .create_offer(LENDER_A, &loan.id, terms(dec!(5000), dec!(8)))
        .await
        .unwrap();
    let offer_b = lifecycle
        .create_offer(LENDER_B, &loan.id, terms(dec!(4500), dec!(7)))
        .await
        .unwrap();

    let coordinator = SettlementCoordinator::new(&ctx);
    let start = date(2026, 10, 19);
    let (first, second) = tokio::join!(
        coordinator.accept_offer_on(BORROWER, &loan.id, &offer_a.id, start),
        coordinator.accept_offer_on(BORROWER, &loan.id, &offer_b.id, start),
    );

    let outcomes = [&first, &second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1, "{:?}", outcomes);
    let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(
        matches!(loser, MarketError::InvalidStateTransition(_) | MarketError::Timeout),
        "{:?}",
        loser
    );

    let loan = lifecycle.loan(&loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    let offers = lifecycle.offers_for_loan(&loan.id).await.unwrap();
    assert_eq!(offers.iter().filter(|o| o.status == OfferStatus::Accepted).count(), 1);
    assert!(offers.iter().all(|o| o.status != OfferStatus::Pending));

    // whichever lender won, every reservation is gone and nothing was lost
    for user in [LENDER_A, LENDER_B] {
        let wallet = ledger.wallet(user, "HTG").await.unwrap();
        assert_eq!(wallet.reserved_balance, dec!(0));
        assert!(ledger.reconcile(&wallet.id).await.unwrap().is_balanced());
    }
    assert_eq!(ledger.total_value("HTG").await.unwrap(), dec!(10000));
}

#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let dir = TempDir::new().unwrap();
    let (_db, ctx) = file_context(&dir).await;
    let ledger = WalletLedger::new(&ctx);
    ledger.deposit(LENDER_A, "HTG", dec!(100)).await.unwrap();

    let (a, b, c) = tokio::join!(
        ledger.withdraw(LENDER_A, "HTG", dec!(60)),
        ledger.withdraw(LENDER_A, "HTG", dec!(60)),
        ledger.withdraw(LENDER_A, "HTG", dec!(60)),
    );
    let succeeded = [&a, &b, &c].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);

    let wallet = ledger.wallet(LENDER_A, "HTG").await.unwrap();
    assert_eq!(wallet.available_balance, dec!(40));
    assert!(ledger.reconcile(&wallet.id).await.unwrap().is_balanced());
}

#[tokio::test]
async fn test_accept_racing_cancel_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let (_db, ctx) = file_context(&dir).await;
    let (loan, offer_a, offer_b) = open_request(&ctx).await;

    let coordinator = SettlementCoordinator::new(&ctx);
    let lifecycle = OfferLifecycle::new(&ctx);
    let (accepted, cancelled) = tokio::join!(
        coordinator.accept_offer_on(BORROWER, &loan.id, &offer_a.id, date(2026, 10, 19)),
        lifecycle.cancel_loan_request(BORROWER, &loan.id),
    );
    assert!(
        accepted.is_ok() != cancelled.is_ok(),
        "accept: {:?}, cancel: {:?}",
        accepted.as_ref().err(),
        cancelled.as_ref().err()
    );

    let loan = lifecycle.loan(&loan.id).await.unwrap();
    let offers = lifecycle.offers_for_loan(&loan.id).await.unwrap();
    let status_of = |id: &str| offers.iter().find(|o| o.id == id).unwrap().status;
    if accepted.is_ok() {
        assert!(matches!(
            cancelled.unwrap_err(),
            MarketError::InvalidStateTransition(_)
        ));
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.lender_id.as_deref(), Some(LENDER_A));
        assert_eq!(status_of(&offer_a.id), OfferStatus::Accepted);
        let borrower = WalletLedger::new(&ctx).wallet(BORROWER, "HTG").await.unwrap();
        assert_eq!(borrower.available_balance, dec!(5000));
    } else {
        assert!(matches!(
            accepted.unwrap_err(),
            MarketError::InvalidStateTransition(_)
        ));
        assert_eq!(loan.status, LoanStatus::Cancelled);
        assert_eq!(loan.lender_id, None);
        assert_eq!(status_of(&offer_a.id), OfferStatus::Rejected);
    }
    assert_eq!(status_of(&offer_b.id), OfferStatus::Rejected);
    assert_no_reservations_left(&ctx).await;
}

#[tokio::test]
async fn test_edit_racing_cancel_leaves_nothing_reserved() {
    let dir = TempDir::new().unwrap();
    let (_db, ctx) = file_context(&dir).await;
    let (loan, offer_a, _) = open_request(&ctx).await;

    let lifecycle = OfferLifecycle::new(&ctx);
    let (edited, cancelled) = tokio::join!(
        lifecycle.edit_offer(LENDER_A, &offer_a.id, terms(dec!(3000), dec!(8))),
        lifecycle.cancel_loan_request(BORROWER, &loan.id),
    );

    // an edit never blocks the cancellation; it either lands first or is refused
    let cancelled = cancelled.unwrap();
    assert_eq!(cancelled.status, LoanStatus::Cancelled);
    if let Err(err) = &edited {
        assert!(matches!(err, MarketError::InvalidStateTransition(_)), "{:?}", err);
    }

    let offer = lifecycle.offer(&offer_a.id).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Rejected);
    let wallet = WalletLedger::new(&ctx).wallet(LENDER_A, "HTG").await.unwrap();
    assert_eq!(wallet.available_balance, dec!(5000));
    assert_no_reservations_left(&ctx).await;
}
