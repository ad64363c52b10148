//! Repayment Tracker
//!
//! Installment payments move funds from the borrower to the lender in the
//! same transaction that updates the installment. Paying the last unpaid
//! installment completes the loan.

use crate::context::{MarketContext, SideEffects};
use crate::error::{MarketError, MarketResult};
use crate::ledger::{lock_wallet_for, to_minor, transfer_in, validate_amount};
use crate::lifecycle::lock_loan;
use chrono::NaiveDate;
use lendmarket_core::{
    ActivityRecord, InstallmentState, Loan, LoanRepayment, LoanStatus, Notification,
};
use lendmarket_persistence::{LoanRepo, RepaymentRepo};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

/// Outcome of one payment
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub installment: LoanRepayment,
    /// Amount moved, in minor units
    pub amount: Decimal,
    pub installment_settled: bool,
    pub loan_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentView {
    pub repayment: LoanRepayment,
    pub state: InstallmentState,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleSummary {
    pub total_due: Decimal,
    pub total_paid: Decimal,
    pub remaining: Decimal,
    pub paid_count: usize,
    pub overdue_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub loan: Loan,
    pub installments: Vec<InstallmentView>,
    pub summary: ScheduleSummary,
}

pub struct RepaymentTracker<'a> {
    ctx: &'a MarketContext,
}

impl<'a> RepaymentTracker<'a> {
    pub fn new(ctx: &'a MarketContext) -> Self {
        Self { ctx }
    }

    /// Borrower pays toward one installment. Partial payments accumulate;
    /// amounts beyond what is due are kept as paid.
    pub async fn record_payment(
        &self,
        borrower_id: &str,
        loan_id: &str,
        installment_number: u32,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> MarketResult<PaymentReceipt> {
        validate_amount(amount, "payment amount")?;

        let mut tx = self.ctx.begin().await?;
        let loan = lock_loan(&mut tx, loan_id).await?;
        if !loan.is_borrower(borrower_id) {
            return Err(MarketError::forbidden("pay installments of someone else's loan"));
        }
        let mut installment = RepaymentRepo::get(&mut tx, loan_id, installment_number).await?;
        if installment.is_paid() {
            return Err(MarketError::AlreadyPaid {
                loan_id: loan_id.to_string(),
                installment: installment_number,
            });
        }
        if loan.status != LoanStatus::Active {
            return Err(MarketError::invalid_state(format!(
                "loan {} is {}, payments need an active loan",
                loan_id, loan.status
            )));
        }
        let lender_id = loan
            .lender_id
            .clone()
            .ok_or_else(|| MarketError::invalid_state(format!("loan {} has no lender", loan_id)))?;

        let amount = to_minor(&loan.currency, amount)?;
        let lender_wallet = lock_wallet_for(&mut tx, &lender_id, &loan.currency).await?;
        let borrower_wallet = lock_wallet_for(&mut tx, borrower_id, &loan.currency).await?;
        transfer_in(&mut tx, &borrower_wallet.id, &lender_wallet.id, amount, Some(loan_id)).await?;

        let settled = installment.apply_payment(amount, payment_date)?;
        RepaymentRepo::save_progress(&mut tx, &installment).await?;

        let mut loan_completed = false;
        if settled && RepaymentRepo::count_unpaid(&mut tx, loan_id).await? == 0 {
            let next = loan.status.transition(LoanStatus::Completed)?;
            loan_completed = LoanRepo::update_status(&mut tx, loan_id, LoanStatus::Active, next).await?;
        }
        tx.commit().await?;

        info!(
            loan_id = %loan_id,
            installment = installment_number,
            amount = %amount,
            settled,
            loan_completed,
            "payment recorded"
        );

        let mut effects = SideEffects::new();
        effects.notify(Notification::payment_received(&lender_id, loan_id, amount, installment_number));
        if loan_completed {
            effects.notify(Notification::loan_completed(borrower_id, loan_id));
            effects.notify(Notification::loan_completed(&lender_id, loan_id));
        }
        effects.record(
            ActivityRecord::new(borrower_id, "payment_recorded", loan_id).with_metadata(json!({
                "installment": installment_number,
                "amount": amount,
                "amount_paid": installment.amount_paid,
                "status": installment.status.as_str(),
            })),
        );
        if loan_completed {
            effects.record(ActivityRecord::new(borrower_id, "loan_completed", loan_id));
        }
        self.ctx.dispatch(effects);

        Ok(PaymentReceipt {
            installment,
            amount,
            installment_settled: settled,
            loan_completed,
        })
    }

    /// Administrative `pending -> late`.
    pub async fn mark_late(&self, actor_id: &str, loan_id: &str, installment_number: u32) -> MarketResult<LoanRepayment> {
        let mut tx = self.ctx.begin().await?;
        lock_loan(&mut tx, loan_id).await?;
        let mut installment = RepaymentRepo::get(&mut tx, loan_id, installment_number).await?;
        installment.mark_late()?;
        RepaymentRepo::save_progress(&mut tx, &installment).await?;
        tx.commit().await?;

        debug!(loan_id = %loan_id, installment = installment_number, "installment marked late");
        let mut effects = SideEffects::new();
        effects.record(
            ActivityRecord::new(actor_id, "installment_late", loan_id)
                .with_metadata(json!({ "installment": installment_number })),
        );
        self.ctx.dispatch(effects);
        Ok(installment)
    }

    /// Schedule with display states as of `today`. `overdue` is derived here
    /// and never stored.
    pub async fn schedule_view(&self, loan_id: &str, today: NaiveDate) -> MarketResult<ScheduleView> {
        let mut conn = self.ctx.conn().await?;
        let loan = LoanRepo::get_by_id(&mut conn, loan_id).await?;
        let rows = RepaymentRepo::list_by_loan(&mut conn, loan_id).await?;

        let mut summary = ScheduleSummary::default();
        let installments: Vec<InstallmentView> = rows
            .into_iter()
            .map(|repayment| {
                let state = repayment.state_on(today);
                summary.total_due += repayment.amount_due;
                summary.total_paid += repayment.amount_paid;
                summary.remaining += repayment.outstanding();
                match state {
                    InstallmentState::Paid => summary.paid_count += 1,
                    InstallmentState::Overdue => summary.overdue_count += 1,
                    _ => {}
                }
                InstallmentView { repayment, state }
            })
            .collect();

        Ok(ScheduleView {
            loan,
            installments,
            summary,
        })
    }
}
