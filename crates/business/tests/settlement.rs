mod common;

use common::*;
use lendmarket_business::{MarketError, OfferLifecycle, RepaymentTracker, SettlementCoordinator};
use lendmarket_core::{LoanStatus, NotificationKind, OfferStatus, RepaymentStatus};
use lendmarket_persistence::{ActivityFilter, RepaymentRepo};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_two_lender_scenario() {
    let mut h = harness().await;
    h.fund(LENDER_A, dec!(10000)).await;
    h.fund(LENDER_B, dec!(10000)).await;

    let loan = h.request(dec!(5000), dec!(10), 6).await;
    let offer_a = h.offer(LENDER_A, &loan.id, dec!(5000), dec!(8)).await;
    let offer_b = h.offer(LENDER_B, &loan.id, dec!(5000), dec!(9)).await;
    h.drain();

    let a_before = h.wallet(LENDER_A).await;
    let b_before = h.wallet(LENDER_B).await;
    assert_eq!(a_before.reserved_balance, dec!(5000));
    assert_eq!(b_before.reserved_balance, dec!(5000));
    let total_before = h.total().await;

    let settlement = SettlementCoordinator::new(&h.ctx)
        .accept_offer_on(BORROWER, &loan.id, &offer_a.id, start_date())
        .await
        .unwrap();

    // lender A: reservation converted to a debit, available untouched
    let a_after = h.wallet(LENDER_A).await;
    assert_eq!(a_after.reserved_balance, a_before.reserved_balance - dec!(5000));
    assert_eq!(a_after.available_balance, a_before.available_balance);

    // lender B: reservation released
    let b_after = h.wallet(LENDER_B).await;
    assert_eq!(b_after.reserved_balance, dec!(0));
    assert_eq!(b_after.available_balance, b_before.available_balance + dec!(5000));

    let borrower = h.wallet(BORROWER).await;
    assert_eq!(borrower.available_balance, dec!(5000));

    assert_eq!(settlement.loan.status, LoanStatus::Active);
    assert_eq!(settlement.loan.lender_id.as_deref(), Some(LENDER_A));
    assert_eq!(settlement.loan.start_date, Some(start_date()));
    assert_eq!(settlement.offer.status, OfferStatus::Accepted);
    assert_eq!(settlement.rejected_offers.len(), 1);
    assert_eq!(settlement.rejected_offers[0].id, offer_b.id);

    let offers = OfferLifecycle::new(&h.ctx).offers_for_loan(&loan.id).await.unwrap();
    let status_of = |id: &str| offers.iter().find(|o| o.id == id).unwrap().status;
    assert_eq!(status_of(&offer_a.id), OfferStatus::Accepted);
    assert_eq!(status_of(&offer_b.id), OfferStatus::Rejected);

    // six installments, one month apart, priced on the accepted offer
    let rows = RepaymentRepo::list_by_loan(&mut *h.ctx.pool().acquire().await.unwrap(), &loan.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 6);
    let expected_dates = [
        date(2026, 11, 19),
        date(2026, 12, 19),
        date(2027, 1, 19),
        date(2027, 2, 19),
        date(2027, 3, 19),
        date(2027, 4, 19),
    ];
    for (row, due) in rows.iter().zip(expected_dates) {
        assert_eq!(row.due_date, due);
        assert_eq!(row.status, RepaymentStatus::Pending);
        assert_eq!(row.amount_paid, dec!(0));
    }
    let principal: Decimal = rows.iter().map(|r| r.principal_amount).sum();
    assert_eq!(principal, dec!(5000));

    assert_eq!(h.total().await, total_before);
    h.assert_books_balance().await;

    let kinds = h.drain_kinds();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::OfferAccepted,
            NotificationKind::LoanFunded,
            NotificationKind::OfferRejected,
            NotificationKind::PaymentDue,
        ]
    );
}

#[tokio::test]
async fn test_amortization_schedule_persisted() {
    let h = harness().await;
    h.fund(LENDER_A, dec!(10000)).await;
    let loan = h.request(dec!(10000), dec!(12), 12).await;
    let offer = h.offer(LENDER_A, &loan.id, dec!(10000), dec!(12)).await;

    let settlement = SettlementCoordinator::new(&h.ctx)
        .accept_offer_on(BORROWER, &loan.id, &offer.id, date(2026, 1, 15))
        .await
        .unwrap();

    let rows = &settlement.schedule;
    assert_eq!(rows.len(), 12);
    let total: Decimal = rows.iter().map(|r| r.amount_due).sum();
    assert_eq!(total, dec!(10661.85));
    assert_eq!(rows[0].amount_due, dec!(888.49));
    assert_eq!(rows[0].interest_amount, dec!(100.00));
    assert_eq!(rows[11].amount_due, dec!(888.46));
    let principal: Decimal = rows.iter().map(|r| r.principal_amount).sum();
    assert_eq!(principal, dec!(10000));

    let view = RepaymentTracker::new(&h.ctx)
        .schedule_view(&loan.id, date(2026, 1, 15))
        .await
        .unwrap();
    assert_eq!(view.summary.total_due, dec!(10661.85));
    assert_eq!(view.summary.remaining, dec!(10661.85));
}

#[tokio::test]
async fn test_single_acceptance() {
    let h = harness().await;
    h.fund(LENDER_A, dec!(5000)).await;
    h.fund(LENDER_B, dec!(5000)).await;
    let loan = h.request(dec!(5000), dec!(10), 6).await;
    let offer_a = h.offer(LENDER_A, &loan.id, dec!(5000), dec!(8)).await;
    let offer_b = h.offer(LENDER_B, &loan.id, dec!(4000), dec!(9)).await;

    let coordinator = SettlementCoordinator::new(&h.ctx);
    coordinator
        .accept_offer_on(BORROWER, &loan.id, &offer_a.id, start_date())
        .await
        .unwrap();

    // the loan left `requested`; nothing else can be accepted
    let err = coordinator
        .accept_offer_on(BORROWER, &loan.id, &offer_b.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidStateTransition(_)), "{:?}", err);

    let err = coordinator
        .accept_offer_on(BORROWER, &loan.id, &offer_a.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidStateTransition(_)));

    // terminal offers stay terminal
    let lifecycle = OfferLifecycle::new(&h.ctx);
    let err = lifecycle.withdraw_offer(LENDER_B, &offer_b.id).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidStateTransition(_)));

    let offers = lifecycle.offers_for_loan(&loan.id).await.unwrap();
    let accepted = offers.iter().filter(|o| o.status == OfferStatus::Accepted).count();
    assert_eq!(accepted, 1);
    h.assert_books_balance().await;
}

#[tokio::test]
async fn test_accept_preconditions() {
    let h = harness().await;
    h.fund(LENDER_A, dec!(5000)).await;
    let loan = h.request(dec!(5000), dec!(10), 6).await;
    let other_loan = h.request(dec!(1000), dec!(10), 6).await;
    let offer = h.offer(LENDER_A, &loan.id, dec!(5000), dec!(8)).await;
    let coordinator = SettlementCoordinator::new(&h.ctx);

    let err = coordinator
        .accept_offer_on(LENDER_A, &loan.id, &offer.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));

    let err = coordinator
        .accept_offer_on(BORROWER, "LOAN_missing", &offer.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound { .. }));

    let err = coordinator
        .accept_offer_on(BORROWER, &loan.id, "OFR_missing", start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound { .. }));

    // offer belongs to a different loan
    let err = coordinator
        .accept_offer_on(BORROWER, &other_loan.id, &offer.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotFound { .. }));

    // none of that moved money
    let lender = h.wallet(LENDER_A).await;
    assert_eq!(lender.reserved_balance, dec!(5000));
    assert!(!h.has_wallet(BORROWER).await);
}

#[tokio::test]
async fn test_failed_settlement_rolls_back_everything() {
    let mut h = harness().await;
    h.fund(LENDER_A, dec!(1)).await;
    h.fund(LENDER_B, dec!(1)).await;

    // 0.05 cannot be spread over 10 monthly installments of at least 0.01
    let loan = h.request(dec!(0.05), dec!(0), 10).await;
    let offer_a = h.offer(LENDER_A, &loan.id, dec!(0.05), dec!(0)).await;
    let offer_b = h.offer(LENDER_B, &loan.id, dec!(0.05), dec!(0)).await;
    let total_before = h.total().await;
    h.drain();

    let err = SettlementCoordinator::new(&h.ctx)
        .accept_offer_on(BORROWER, &loan.id, &offer_a.id, start_date())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::SettlementFailed(_)), "{:?}", err);
    assert!(err.is_retryable());

    let lifecycle = OfferLifecycle::new(&h.ctx);
    assert_eq!(lifecycle.loan(&loan.id).await.unwrap().status, LoanStatus::Requested);
    assert!(lifecycle.loan(&loan.id).await.unwrap().lender_id.is_none());
    assert_eq!(lifecycle.offer(&offer_a.id).await.unwrap().status, OfferStatus::Pending);
    assert_eq!(lifecycle.offer(&offer_b.id).await.unwrap().status, OfferStatus::Pending);

    assert_eq!(h.wallet(LENDER_A).await.reserved_balance, dec!(0.05));
    assert_eq!(h.wallet(LENDER_B).await.reserved_balance, dec!(0.05));
    assert!(!h.has_wallet(BORROWER).await);

    let rows = RepaymentRepo::list_by_loan(&mut *h.ctx.pool().acquire().await.unwrap(), &loan.id)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(h.total().await, total_before);
    assert!(h.drain().is_empty());
    h.assert_books_balance().await;

    let accepted = h
        .db
        .activity_reader()
        .read_all()
        .map(|all| ActivityFilter::new().actions(&["offer_accepted"]).apply(all))
        .unwrap();
    assert!(accepted.is_empty());
}
