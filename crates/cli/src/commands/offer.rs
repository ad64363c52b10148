//! Offers: create, edit, reject, withdraw, accept

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use lendmarket_business::{OfferLifecycle, OfferTerms, SettlementCoordinator};
use lendmarket_core::LoanOffer;

use super::{print_json, Session};
use crate::config::MarketConfig;
use crate::{Cli, OfferAction};

pub async fn handle(config: &MarketConfig, cli: &Cli, action: &OfferAction) -> Result<()> {
    let session = Session::open(config).await?;
    let lifecycle = OfferLifecycle::new(&session.ctx);

    match action {
        OfferAction::Create {
            loan_id,
            amount,
            rate,
            notes,
        } => {
            let terms = OfferTerms {
                amount: *amount,
                interest_rate: *rate,
                notes: notes.clone(),
            };
            let offer = lifecycle.create_offer(cli.actor()?, loan_id, terms).await?;
            println!("✅ Offer placed!");
            println!("   Offer:    {}", offer.id);
            println!("   Amount:   {} (reserved from your wallet)", offer.amount);
            println!("   Rate:     {}% per year", offer.interest_rate);
        }

        OfferAction::Edit {
            offer_id,
            amount,
            rate,
            notes,
        } => {
            let terms = OfferTerms {
                amount: *amount,
                interest_rate: *rate,
                notes: notes.clone(),
            };
            let offer = lifecycle.edit_offer(cli.actor()?, offer_id, terms).await?;
            println!("✅ Offer {} updated", offer.id);
            println!("   Amount:   {}", offer.amount);
            println!("   Rate:     {}% per year", offer.interest_rate);
        }

        OfferAction::Reject { offer_id, reason } => {
            let offer = lifecycle.reject_offer(cli.actor()?, offer_id, reason).await?;
            println!("✅ Offer {} rejected", offer.id);
        }

        OfferAction::Withdraw { offer_id } => {
            let offer = lifecycle.withdraw_offer(cli.actor()?, offer_id).await?;
            println!("✅ Offer {} withdrawn, {} released", offer.id, offer.amount);
        }

        OfferAction::List { loan_id } => {
            let offers = match loan_id {
                Some(loan_id) => lifecycle.offers_for_loan(loan_id).await?,
                None => lifecycle.offers_by_lender(cli.actor()?).await?,
            };
            if cli.json {
                print_json(&offers)?;
            } else {
                print_offers(&offers);
            }
        }
    }

    session.close().await;
    Ok(())
}

pub async fn accept(
    config: &MarketConfig,
    user: &str,
    loan_id: &str,
    offer_id: &str,
    start: Option<NaiveDate>,
) -> Result<()> {
    let session = Session::open(config).await?;
    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let settlement = SettlementCoordinator::new(&session.ctx)
        .accept_offer_on(user, loan_id, offer_id, start)
        .await?;

    println!("✅ Offer accepted, loan funded!");
    println!("   Loan:     {} ({})", settlement.loan.id, settlement.loan.status);
    println!("   Lender:   {}", settlement.offer.lender_id);
    println!("   Amount:   {} {}", settlement.offer.amount, settlement.loan.currency);
    println!("   Rejected: {} competing offer(s)", settlement.rejected_offers.len());
    if let Some(first) = settlement.schedule.first() {
        println!(
            "   First installment of {} due {}",
            first.amount_due, first.due_date
        );
    }

    session.close().await;
    Ok(())
}

pub fn print_offers(offers: &[LoanOffer]) {
    if offers.is_empty() {
        println!("No offers found.");
        return;
    }
    println!(
        "{:<40} {:<12} {:>14} {:>7}  {:<10} {}",
        "Offer", "Lender", "Amount", "Rate", "Status", "Note"
    );
    println!("{}", "-".repeat(100));
    for offer in offers {
        let note = offer
            .rejection_reason
            .as_deref()
            .or(offer.notes.as_deref())
            .unwrap_or("");
        println!(
            "{:<40} {:<12} {:>14} {:>7}  {:<10} {}",
            offer.id,
            offer.lender_id,
            offer.amount,
            format!("{}%", offer.interest_rate),
            offer.status.as_str(),
            note
        );
    }
}
