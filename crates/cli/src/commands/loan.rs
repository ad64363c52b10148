//! Loan requests: create, inspect, cancel, default

use anyhow::Result;
use lendmarket_business::{OfferLifecycle, WalletLedger};
use lendmarket_core::{Loan, NewLoan};
use lendmarket_persistence::LoanFilter;

use super::{currency_or_default, print_json, Session};
use crate::config::MarketConfig;
use crate::{Cli, LoanAction};

pub async fn handle(config: &MarketConfig, cli: &Cli, action: &LoanAction) -> Result<()> {
    let session = Session::open(config).await?;
    let lifecycle = OfferLifecycle::new(&session.ctx);

    match action {
        LoanAction::Request {
            amount,
            rate,
            term,
            purpose,
            currency,
        } => {
            let request = NewLoan {
                amount: *amount,
                currency: currency_or_default(config, currency.as_deref()),
                interest_rate: *rate,
                term_months: *term,
                purpose: purpose.clone(),
            };
            let loan = lifecycle.request_loan(cli.actor()?, request).await?;
            println!("✅ Loan requested!");
            print_loan(&loan);
        }

        LoanAction::Show { loan_id } => {
            let loan = lifecycle.loan(loan_id).await?;
            let offers = lifecycle.offers_for_loan(loan_id).await?;
            let movements = WalletLedger::new(&session.ctx).movements(loan_id).await?;
            if cli.json {
                print_json(&serde_json::json!({
                    "loan": loan,
                    "offers": offers,
                    "movements": movements,
                }))?;
            } else {
                print_loan(&loan);
                println!();
                println!("📨 Offers ({})", offers.len());
                super::offer::print_offers(&offers);
                if !movements.is_empty() {
                    println!();
                    println!("💸 Money movements ({})", movements.len());
                    for entry in &movements {
                        println!("   {:<20} {:>14}  {}", entry.tx_type.as_str(), entry.amount, entry.wallet_id);
                    }
                }
            }
        }

        LoanAction::List { mine, status } => {
            let status = status.map(|s| s.to_core());
            let loans = if *mine {
                let user = cli.actor()?;
                let mut loans = lifecycle
                    .loans(&LoanFilter {
                        borrower_id: Some(user.to_string()),
                        status,
                        ..LoanFilter::default()
                    })
                    .await?;
                loans.extend(
                    lifecycle
                        .loans(&LoanFilter {
                            lender_id: Some(user.to_string()),
                            status,
                            ..LoanFilter::default()
                        })
                        .await?,
                );
                loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
                loans.dedup_by(|a, b| a.id == b.id);
                loans
            } else {
                lifecycle
                    .loans(&LoanFilter {
                        status,
                        ..LoanFilter::default()
                    })
                    .await?
            };

            if cli.json {
                print_json(&loans)?;
            } else {
                print_loan_table(&loans);
            }
        }

        LoanAction::Cancel { loan_id } => {
            let loan = lifecycle.cancel_loan_request(cli.actor()?, loan_id).await?;
            println!("✅ Loan request {} cancelled", loan.id);
            println!("   Pending offers were rejected and their reservations released");
        }

        LoanAction::Default { loan_id } => {
            let loan = lifecycle.mark_defaulted(cli.actor()?, loan_id).await?;
            println!("⚠️  Loan {} marked as {}", loan.id, loan.status);
        }
    }

    session.close().await;
    Ok(())
}

fn print_loan(loan: &Loan) {
    println!("   Loan:     {}", loan.id);
    println!("   Borrower: {}", loan.borrower_id);
    if let Some(lender) = &loan.lender_id {
        println!("   Lender:   {}", lender);
    }
    println!("   Amount:   {} {}", loan.amount, loan.currency);
    println!("   Rate:     {}% per year", loan.interest_rate);
    println!("   Term:     {} months", loan.term_months);
    println!("   Purpose:  {}", loan.purpose);
    println!("   Status:   {}", loan.status);
    if let Some(start) = loan.start_date {
        println!("   Start:    {}", start);
    }
}

fn print_loan_table(loans: &[Loan]) {
    if loans.is_empty() {
        println!("No loans found.");
        return;
    }
    println!(
        "{:<40} {:<12} {:>14} {:>7} {:>5}  {}",
        "Loan", "Borrower", "Amount", "Rate", "Term", "Status"
    );
    println!("{}", "-".repeat(92));
    for loan in loans {
        println!(
            "{:<40} {:<12} {:>14} {:>7} {:>5}  {}",
            loan.id,
            loan.borrower_id,
            format!("{} {}", loan.amount, loan.currency),
            format!("{}%", loan.interest_rate),
            loan.term_months,
            loan.status
        );
    }
}
