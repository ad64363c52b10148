//! Loan Offer Lifecycle
//!
//! Loan requests and the competing offers against them. Offers may only be
//! created, edited, rejected or withdrawn while the loan is `requested`;
//! acceptance goes through [`crate::settlement::SettlementCoordinator`].
//!
//! Lock order inside every transaction: loan, lender wallet, borrower
//! wallet, offers by id.

use crate::context::{MarketContext, SideEffects};
use crate::error::{MarketError, MarketResult};
use crate::ledger::{lock_wallet_for, release_in, reserve_in, to_minor, validate_amount};
use lendmarket_core::loan::validate_rate;
use lendmarket_core::{
    generate_id, ActivityRecord, Loan, LoanOffer, LoanStatus, NewLoan, Notification, OfferStatus,
};
use lendmarket_persistence::{LoanFilter, LoanRepo, OfferRepo};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};

pub(crate) const REASON_LOAN_CANCELLED: &str = "loan request cancelled";

/// New terms for a pending offer
#[derive(Debug, Clone)]
pub struct OfferTerms {
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub notes: Option<String>,
}

pub struct OfferLifecycle<'a> {
    ctx: &'a MarketContext,
}

/// Lock and load a loan; the returned row cannot change until commit.
pub(crate) async fn lock_loan(conn: &mut SqliteConnection, loan_id: &str) -> MarketResult<Loan> {
    LoanRepo::lock(conn, loan_id).await?;
    Ok(LoanRepo::get_by_id(conn, loan_id).await?)
}

pub(crate) async fn lock_offer(conn: &mut SqliteConnection, offer_id: &str) -> MarketResult<LoanOffer> {
    OfferRepo::lock(conn, offer_id).await?;
    Ok(OfferRepo::get_by_id(conn, offer_id).await?)
}

/// Release a pending offer's reservation and close it. Caller holds the loan
/// lock.
pub(crate) async fn close_offer_in(
    conn: &mut SqliteConnection,
    offer: &LoanOffer,
    currency: &str,
    next: OfferStatus,
    reason: Option<&str>,
) -> MarketResult<LoanOffer> {
    let wallet = lock_wallet_for(conn, &offer.lender_id, currency).await?;
    let offer = lock_offer(conn, &offer.id).await?;
    let status = offer.status.transition(next)?;

    release_in(conn, &wallet.id, offer.amount, Some(&offer.id)).await?;
    if !OfferRepo::close(conn, &offer.id, status, reason).await? {
        return Err(MarketError::invalid_state(format!("offer {} is no longer pending", offer.id)));
    }

    Ok(LoanOffer {
        status,
        rejection_reason: reason.map(str::to_string),
        ..offer
    })
}

fn ensure_requested(loan: &Loan) -> MarketResult<()> {
    if !loan.status.accepts_offers() {
        return Err(MarketError::invalid_state(format!(
            "loan {} is {}, offers can only change while it is requested",
            loan.id, loan.status
        )));
    }
    Ok(())
}

impl<'a> OfferLifecycle<'a> {
    pub fn new(ctx: &'a MarketContext) -> Self {
        Self { ctx }
    }

    /// Submit a loan request. The currency falls back to the configured
    /// default when empty.
    pub async fn request_loan(&self, borrower_id: &str, mut request: NewLoan) -> MarketResult<Loan> {
        if request.currency.trim().is_empty() {
            request.currency = self.ctx.settings().default_currency.clone();
        }
        request.validate(self.ctx.settings().max_term_months)?;
        request.amount = to_minor(&request.currency.to_uppercase(), request.amount)?;

        let loan = request.into_loan(generate_id("LOAN"), borrower_id.to_string());
        LoanRepo::insert(&mut *self.ctx.conn().await?, &loan).await?;

        info!(loan_id = %loan.id, borrower_id = %borrower_id, amount = %loan.amount, "loan requested");
        let mut effects = SideEffects::new();
        effects.record(
            ActivityRecord::new(borrower_id, "loan_requested", &loan.id).with_metadata(json!({
                "amount": loan.amount,
                "currency": loan.currency,
                "interest_rate": loan.interest_rate,
                "term_months": loan.term_months,
            })),
        );
        self.ctx.dispatch(effects);
        Ok(loan)
    }

    /// Place an offer and reserve its amount from the lender's wallet.
    pub async fn create_offer(
        &self,
        lender_id: &str,
        loan_id: &str,
        terms: OfferTerms,
    ) -> MarketResult<LoanOffer> {
        validate_amount(terms.amount, "offer amount")?;
        validate_rate(terms.interest_rate)?;

        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, loan_id).await?;
        ensure_requested(&loan)?;
        if loan.is_borrower(lender_id) {
            return Err(MarketError::forbidden("make an offer on your own loan request"));
        }
        let amount = to_minor(&loan.currency, terms.amount)?;
        if amount > loan.amount {
            return Err(MarketError::Validation(format!(
                "offer amount {} exceeds the requested {}",
                amount, loan.amount
            )));
        }

        let offer = LoanOffer::new(
            generate_id("OFR"),
            loan.id.clone(),
            lender_id.to_string(),
            amount,
            terms.interest_rate,
            terms.notes,
        );
        let wallet = lock_wallet_for(&mut tx, lender_id, &loan.currency).await?;
        reserve_in(&mut tx, &wallet.id, amount, Some(&offer.id)).await?;
        OfferRepo::insert(&mut tx, &offer).await?;
        tx.commit().await?;

        if offer.exceeds_ceiling(loan.interest_rate) {
            info!(
                offer_id = %offer.id,
                offer_rate = %offer.interest_rate,
                ceiling = %loan.interest_rate,
                "offer rate above borrower ceiling"
            );
        }
        info!(loan_id = %loan.id, offer_id = %offer.id, lender_id = %lender_id, amount = %amount, "offer created");

        let mut effects = SideEffects::new();
        effects.notify(Notification::offer_created(
            &loan.borrower_id,
            &offer.id,
            offer.amount,
            offer.interest_rate,
        ));
        effects.record(
            ActivityRecord::new(lender_id, "offer_created", &offer.id).with_metadata(json!({
                "loan_id": loan.id,
                "amount": offer.amount,
                "interest_rate": offer.interest_rate,
            })),
        );
        self.ctx.dispatch(effects);
        Ok(offer)
    }

    /// Change a pending offer's terms, adjusting the reservation by the
    /// amount delta. The loan is re-checked under its lock.
    pub async fn edit_offer(&self, lender_id: &str, offer_id: &str, terms: OfferTerms) -> MarketResult<LoanOffer> {
        validate_amount(terms.amount, "offer amount")?;
        validate_rate(terms.interest_rate)?;

        let snapshot = OfferRepo::get_by_id(&mut *self.ctx.conn().await?, offer_id).await?;

        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, &snapshot.loan_id).await?;
        if snapshot.lender_id != lender_id {
            return Err(MarketError::forbidden("edit another lender's offer"));
        }
        ensure_requested(&loan)?;

        let wallet = lock_wallet_for(&mut tx, lender_id, &loan.currency).await?;
        let current = lock_offer(&mut tx, offer_id).await?;
        if !current.is_pending() {
            return Err(MarketError::invalid_state(format!(
                "offer {} is {}",
                current.id, current.status
            )));
        }

        let amount = to_minor(&loan.currency, terms.amount)?;
        if amount > loan.amount {
            return Err(MarketError::Validation(format!(
                "offer amount {} exceeds the requested {}",
                amount, loan.amount
            )));
        }

        let delta = current.amount_delta(amount);
        if delta > Decimal::ZERO {
            reserve_in(&mut tx, &wallet.id, delta, Some(offer_id)).await?;
        } else if delta < Decimal::ZERO {
            release_in(&mut tx, &wallet.id, -delta, Some(offer_id)).await?;
        }
        OfferRepo::update_terms(&mut tx, offer_id, amount, terms.interest_rate, terms.notes.as_deref()).await?;
        let updated = OfferRepo::get_by_id(&mut tx, offer_id).await?;
        tx.commit().await?;

        info!(offer_id = %offer_id, delta = %delta, "offer edited");
        let mut effects = SideEffects::new();
        effects.record(
            ActivityRecord::new(lender_id, "offer_edited", offer_id).with_metadata(json!({
                "old_amount": current.amount,
                "new_amount": updated.amount,
                "interest_rate": updated.interest_rate,
            })),
        );
        self.ctx.dispatch(effects);
        Ok(updated)
    }

    /// Borrower turns down a pending offer.
    pub async fn reject_offer(&self, borrower_id: &str, offer_id: &str, reason: &str) -> MarketResult<LoanOffer> {
        let snapshot = OfferRepo::get_by_id(&mut *self.ctx.conn().await?, offer_id).await?;

        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, &snapshot.loan_id).await?;
        if !loan.is_borrower(borrower_id) {
            return Err(MarketError::forbidden("reject offers on someone else's loan"));
        }
        ensure_requested(&loan)?;
        let rejected =
            close_offer_in(&mut tx, &snapshot, &loan.currency, OfferStatus::Rejected, Some(reason)).await?;
        tx.commit().await?;

        info!(offer_id = %offer_id, loan_id = %loan.id, "offer rejected");
        let mut effects = SideEffects::new();
        effects.notify(Notification::offer_rejected(&rejected.lender_id, offer_id, reason));
        effects.record(
            ActivityRecord::new(borrower_id, "offer_rejected", offer_id)
                .with_metadata(json!({ "reason": reason, "released": rejected.amount })),
        );
        self.ctx.dispatch(effects);
        Ok(rejected)
    }

    /// Lender pulls back their own pending offer.
    pub async fn withdraw_offer(&self, lender_id: &str, offer_id: &str) -> MarketResult<LoanOffer> {
        let snapshot = OfferRepo::get_by_id(&mut *self.ctx.conn().await?, offer_id).await?;

        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, &snapshot.loan_id).await?;
        if snapshot.lender_id != lender_id {
            return Err(MarketError::forbidden("withdraw another lender's offer"));
        }
        ensure_requested(&loan)?;
        let withdrawn =
            close_offer_in(&mut tx, &snapshot, &loan.currency, OfferStatus::Withdrawn, None).await?;
        tx.commit().await?;

        info!(offer_id = %offer_id, loan_id = %loan.id, "offer withdrawn");
        let mut effects = SideEffects::new();
        effects.notify(Notification::offer_withdrawn(&loan.borrower_id, offer_id));
        effects.record(
            ActivityRecord::new(lender_id, "offer_withdrawn", offer_id)
                .with_metadata(json!({ "released": withdrawn.amount })),
        );
        self.ctx.dispatch(effects);
        Ok(withdrawn)
    }

    /// Cancel a request and reject every pending offer on it.
    pub async fn cancel_loan_request(&self, borrower_id: &str, loan_id: &str) -> MarketResult<Loan> {
        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, loan_id).await?;
        if !loan.is_borrower(borrower_id) {
            return Err(MarketError::forbidden("cancel someone else's loan request"));
        }
        let status = loan.status.transition(LoanStatus::Cancelled)?;

        let pending = OfferRepo::pending_for_loan(&mut tx, loan_id).await?;
        let mut rejected = Vec::with_capacity(pending.len());
        for offer in &pending {
            rejected.push(
                close_offer_in(
                    &mut tx,
                    offer,
                    &loan.currency,
                    OfferStatus::Rejected,
                    Some(REASON_LOAN_CANCELLED),
                )
                .await?,
            );
        }
        if !LoanRepo::update_status(&mut tx, loan_id, LoanStatus::Requested, status).await? {
            return Err(MarketError::invalid_state(format!("loan {} is no longer requested", loan_id)));
        }
        let loan = LoanRepo::get_by_id(&mut tx, loan_id).await?;
        tx.commit().await?;

        info!(loan_id = %loan_id, rejected_offers = rejected.len(), "loan request cancelled");
        let mut effects = SideEffects::new();
        for offer in &rejected {
            effects.notify(Notification::offer_rejected(&offer.lender_id, &offer.id, REASON_LOAN_CANCELLED));
            effects.notify(Notification::loan_cancelled(&offer.lender_id, loan_id));
        }
        effects.record(
            ActivityRecord::new(borrower_id, "loan_cancelled", loan_id).with_metadata(json!({
                "rejected_offers": rejected.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            })),
        );
        self.ctx.dispatch(effects);
        Ok(loan)
    }

    /// Administrative `active -> defaulted`.
    pub async fn mark_defaulted(&self, actor_id: &str, loan_id: &str) -> MarketResult<Loan> {
        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, loan_id).await?;
        let status = loan.status.transition(LoanStatus::Defaulted)?;
        if !LoanRepo::update_status(&mut tx, loan_id, LoanStatus::Active, status).await? {
            return Err(MarketError::invalid_state(format!("loan {} is no longer active", loan_id)));
        }
        let loan = LoanRepo::get_by_id(&mut tx, loan_id).await?;
        tx.commit().await?;

        warn!(loan_id = %loan_id, actor_id = %actor_id, "loan marked defaulted");
        let mut effects = SideEffects::new();
        effects.record(ActivityRecord::new(actor_id, "loan_defaulted", loan_id));
        self.ctx.dispatch(effects);
        Ok(loan)
    }

    // === Queries ===

    pub async fn loan(&self, loan_id: &str) -> MarketResult<Loan> {
        Ok(LoanRepo::get_by_id(&mut *self.ctx.conn().await?, loan_id).await?)
    }

    pub async fn loans(&self, filter: &LoanFilter) -> MarketResult<Vec<Loan>> {
        Ok(LoanRepo::list(&mut *self.ctx.conn().await?, filter).await?)
    }

    pub async fn offer(&self, offer_id: &str) -> MarketResult<LoanOffer> {
        Ok(OfferRepo::get_by_id(&mut *self.ctx.conn().await?, offer_id).await?)
    }

    pub async fn offers_for_loan(&self, loan_id: &str) -> MarketResult<Vec<LoanOffer>> {
        Ok(OfferRepo::list_by_loan(&mut *self.ctx.conn().await?, loan_id).await?)
    }

    pub async fn offers_by_lender(&self, lender_id: &str) -> MarketResult<Vec<LoanOffer>> {
        Ok(OfferRepo::list_by_lender(&mut *self.ctx.conn().await?, lender_id).await?)
    }
}
