//! Loan Settlement Coordinator
//!
//! Accepting an offer is one transaction: the lender's reservation becomes a
//! debit, the borrower is credited, the loan goes `active`, every competing
//! offer is rejected with its reservation released, and the repayment
//! schedule is written. Any failure after the preconditions pass rolls all of
//! it back and surfaces as [`MarketError::SettlementFailed`].

use crate::context::{MarketContext, SideEffects};
use crate::error::{MarketError, MarketResult};
use crate::ledger::{lock_wallet_for, settle_in};
use crate::lifecycle::{close_offer_in, lock_loan, lock_offer};
use chrono::{NaiveDate, Utc};
use lendmarket_core::{
    generate_id, schedule, ActivityRecord, Currency, Loan, LoanOffer, LoanRepayment, LoanStatus,
    Notification, OfferStatus,
};
use lendmarket_persistence::{LoanRepo, OfferRepo, RepaymentRepo};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

pub(crate) const REASON_OUTBID: &str = "another offer was accepted";

/// Everything an acceptance changed
#[derive(Debug, Clone)]
pub struct Settlement {
    pub loan: Loan,
    pub offer: LoanOffer,
    pub rejected_offers: Vec<LoanOffer>,
    pub schedule: Vec<LoanRepayment>,
}

pub struct SettlementCoordinator<'a> {
    ctx: &'a MarketContext,
}

impl<'a> SettlementCoordinator<'a> {
    pub fn new(ctx: &'a MarketContext) -> Self {
        Self { ctx }
    }

    /// Accept an offer with today's date as the loan start.
    pub async fn accept_offer(&self, borrower_id: &str, loan_id: &str, offer_id: &str) -> MarketResult<Settlement> {
        self.accept_offer_on(borrower_id, loan_id, offer_id, Utc::now().date_naive())
            .await
    }

    /// Accept an offer with an explicit start date; installments fall due one
    /// month apart from `start_date`.
    #[instrument(name = "settlement.accept_offer", skip(self), err)]
    pub async fn accept_offer_on(
        &self,
        borrower_id: &str,
        loan_id: &str,
        offer_id: &str,
        start_date: NaiveDate,
    ) -> MarketResult<Settlement> {
        let mut tx = self.ctx.begin().await?;

        // Preconditions, checked after the loan lock is held.
        let loan = lock_loan(&mut tx, loan_id).await?;
        if !loan.is_borrower(borrower_id) {
            return Err(MarketError::forbidden("accept offers on someone else's loan"));
        }
        if loan.status != LoanStatus::Requested {
            return Err(MarketError::invalid_state(format!(
                "loan {} is {}, only requested loans can be funded",
                loan.id, loan.status
            )));
        }
        let offer = OfferRepo::get_by_id(&mut tx, offer_id).await?;
        if offer.loan_id != loan.id {
            return Err(MarketError::not_found("LoanOffer", &format!("{} on loan {}", offer_id, loan_id)));
        }
        if !offer.is_pending() {
            return Err(MarketError::invalid_state(format!(
                "offer {} is {}",
                offer.id, offer.status
            )));
        }

        let settlement = settle_locked(&mut tx, &loan, &offer, start_date)
            .await
            .map_err(MarketError::settlement_failed)?;
        tx.commit().await.map_err(|e| MarketError::settlement_failed(e.into()))?;

        info!(
            loan_id = %loan.id,
            offer_id = %offer.id,
            lender_id = %offer.lender_id,
            amount = %offer.amount,
            rejected_offers = settlement.rejected_offers.len(),
            installments = settlement.schedule.len(),
            "offer accepted, loan funded"
        );
        self.ctx.dispatch(side_effects(&settlement));
        Ok(settlement)
    }
}

/// Steps after the preconditions. The loan row is already locked.
async fn settle_locked(
    conn: &mut SqliteConnection,
    loan: &Loan,
    offer: &LoanOffer,
    start_date: NaiveDate,
) -> MarketResult<Settlement> {
    let lender_wallet = lock_wallet_for(conn, &offer.lender_id, &loan.currency).await?;
    let borrower_wallet = lock_wallet_for(conn, &loan.borrower_id, &loan.currency).await?;
    let offer = lock_offer(conn, &offer.id).await?;
    let accepted_status = offer.status.transition(OfferStatus::Accepted)?;

    settle_in(conn, &lender_wallet.id, &borrower_wallet.id, offer.amount, Some(&loan.id)).await?;

    if !LoanRepo::activate(conn, &loan.id, &offer.lender_id, start_date).await? {
        return Err(MarketError::invalid_state(format!("loan {} is no longer requested", loan.id)));
    }
    if !OfferRepo::close(conn, &offer.id, accepted_status, None).await? {
        return Err(MarketError::invalid_state(format!("offer {} is no longer pending", offer.id)));
    }

    let competing = OfferRepo::pending_for_loan(conn, &loan.id).await?;
    let mut rejected_offers = Vec::with_capacity(competing.len());
    for other in &competing {
        rejected_offers.push(
            close_offer_in(conn, other, &loan.currency, OfferStatus::Rejected, Some(REASON_OUTBID)).await?,
        );
    }

    let currency = Currency::from_code(&loan.currency);
    let installments = schedule(
        offer.amount,
        offer.interest_rate,
        loan.term_months,
        start_date,
        currency.decimals,
    )?;
    let rows: Vec<LoanRepayment> = installments
        .iter()
        .map(|i| LoanRepayment::from_installment(generate_id("RPY"), &loan.id, i))
        .collect();
    RepaymentRepo::insert_batch(conn, &rows).await?;

    let funded = LoanRepo::get_by_id(conn, &loan.id).await?;
    Ok(Settlement {
        loan: funded,
        offer: LoanOffer {
            status: accepted_status,
            ..offer
        },
        rejected_offers,
        schedule: rows,
    })
}

fn side_effects(s: &Settlement) -> SideEffects {
    let mut effects = SideEffects::new();
    effects.notify(Notification::offer_accepted(&s.offer.lender_id, &s.offer.id, s.offer.amount));
    effects.notify(Notification::loan_funded(&s.loan.borrower_id, &s.loan.id, s.offer.amount));
    for rejected in &s.rejected_offers {
        effects.notify(Notification::offer_rejected(&rejected.lender_id, &rejected.id, REASON_OUTBID));
    }
    if let Some(first) = s.schedule.first() {
        effects.notify(Notification::payment_due(
            &s.loan.borrower_id,
            &s.loan.id,
            first.amount_due,
            first.due_date,
        ));
    }
    effects.record(
        ActivityRecord::new(&s.loan.borrower_id, "offer_accepted", &s.offer.id).with_metadata(json!({
            "loan_id": s.loan.id,
            "lender_id": s.offer.lender_id,
            "amount": s.offer.amount,
            "interest_rate": s.offer.interest_rate,
            "rejected_offers": s.rejected_offers.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
        })),
    );
    effects
}
