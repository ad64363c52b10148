//! Installment payments and schedule display

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use lendmarket_business::{RepaymentTracker, ScheduleView};
use rust_decimal::Decimal;

use super::{print_json, Session};
use crate::config::MarketConfig;

pub async fn pay(
    config: &MarketConfig,
    user: &str,
    loan_id: &str,
    installment: u32,
    amount: Decimal,
    date: Option<NaiveDate>,
) -> Result<()> {
    let session = Session::open(config).await?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let receipt = RepaymentTracker::new(&session.ctx)
        .record_payment(user, loan_id, installment, amount, date)
        .await?;

    println!("✅ Payment recorded!");
    println!("   Installment: #{}", receipt.installment.installment_number);
    println!("   Paid now:    {}", receipt.amount);
    println!(
        "   Paid total:  {} of {}",
        receipt.installment.amount_paid, receipt.installment.amount_due
    );
    if receipt.installment_settled {
        println!("   Installment settled");
    }
    if receipt.loan_completed {
        println!("🎉 Loan {} is fully repaid", loan_id);
    }

    session.close().await;
    Ok(())
}

pub async fn mark_late(config: &MarketConfig, user: &str, loan_id: &str, installment: u32) -> Result<()> {
    let session = Session::open(config).await?;
    let repayment = RepaymentTracker::new(&session.ctx)
        .mark_late(user, loan_id, installment)
        .await?;
    println!(
        "⚠️  Installment #{} of {} marked {}",
        repayment.installment_number, loan_id, repayment.status
    );
    session.close().await;
    Ok(())
}

pub async fn schedule(config: &MarketConfig, loan_id: &str, today: Option<NaiveDate>, json: bool) -> Result<()> {
    let session = Session::open(config).await?;
    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let view = RepaymentTracker::new(&session.ctx)
        .schedule_view(loan_id, today)
        .await?;

    if json {
        print_json(&view)?;
    } else {
        print_schedule(&view, today);
    }

    session.close().await;
    Ok(())
}

fn print_schedule(view: &ScheduleView, today: NaiveDate) {
    println!(
        "📅 Schedule of {} ({} {}, {}) as of {}",
        view.loan.id, view.loan.amount, view.loan.currency, view.loan.status, today
    );
    if view.installments.is_empty() {
        println!("No installments: the loan has not been funded.");
        return;
    }
    println!(
        "{:>3}  {:<10} {:>12} {:>12} {:>12} {:>12}  {}",
        "#", "Due", "Amount", "Principal", "Interest", "Paid", "State"
    );
    println!("{}", "-".repeat(84));
    for item in &view.installments {
        let r = &item.repayment;
        println!(
            "{:>3}  {:<10} {:>12} {:>12} {:>12} {:>12}  {}",
            r.installment_number,
            r.due_date,
            r.amount_due,
            r.principal_amount,
            r.interest_amount,
            r.amount_paid,
            item.state
        );
    }
    println!("{}", "-".repeat(84));
    let summary = &view.summary;
    println!(
        "Total due {}, paid {}, remaining {} ({} paid, {} overdue)",
        summary.total_due,
        summary.total_paid,
        summary.remaining,
        summary.paid_count,
        summary.overdue_count
    );
}
