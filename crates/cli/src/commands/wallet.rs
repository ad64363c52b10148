//! Wallet operations: deposit, withdraw, balances, ledger history

use anyhow::Result;
use lendmarket_business::WalletLedger;
use rust_decimal::Decimal;

use super::{currency_or_default, print_json, Session};
use crate::config::MarketConfig;

pub async fn deposit(config: &MarketConfig, user: &str, currency: Option<&str>, amount: Decimal) -> Result<()> {
    let session = Session::open(config).await?;
    let currency = currency_or_default(config, currency);
    let wallet = WalletLedger::new(&session.ctx)
        .deposit(user, &currency, amount)
        .await?;

    println!("✅ Deposit successful!");
    println!("   Wallet:  {}", wallet.id);
    println!("   Balance: {}", wallet);

    session.close().await;
    Ok(())
}

pub async fn withdraw(config: &MarketConfig, user: &str, currency: Option<&str>, amount: Decimal) -> Result<()> {
    let session = Session::open(config).await?;
    let currency = currency_or_default(config, currency);
    let wallet = WalletLedger::new(&session.ctx)
        .withdraw(user, &currency, amount)
        .await?;

    println!("✅ Withdrawal successful!");
    println!("   Wallet:  {}", wallet.id);
    println!("   Balance: {}", wallet);

    session.close().await;
    Ok(())
}

pub async fn balance(config: &MarketConfig, user: &str, json: bool) -> Result<()> {
    let session = Session::open(config).await?;
    let wallets = WalletLedger::new(&session.ctx).wallets(user).await?;

    if json {
        print_json(&wallets)?;
    } else if wallets.is_empty() {
        println!("No wallets for {} yet. Deposit to open one.", user);
    } else {
        println!("💰 Wallets of {}", user);
        println!("{:<10} {:>16} {:>16}", "Currency", "Available", "Reserved");
        println!("{}", "-".repeat(44));
        for wallet in &wallets {
            println!(
                "{:<10} {:>16} {:>16}",
                wallet.currency, wallet.available_balance, wallet.reserved_balance
            );
        }
    }

    session.close().await;
    Ok(())
}

pub async fn history(config: &MarketConfig, user: &str, currency: Option<&str>, json: bool) -> Result<()> {
    let session = Session::open(config).await?;
    let ledger = WalletLedger::new(&session.ctx);
    let currency = currency_or_default(config, currency);
    let wallet = ledger.wallet(user, &currency).await?;
    let entries = ledger.history(&wallet.id).await?;

    if json {
        print_json(&entries)?;
    } else {
        println!("📜 Ledger of {} ({})", wallet.id, wallet.currency);
        println!("{:<26} {:<20} {:>14}  {}", "Time", "Type", "Amount", "Reference");
        println!("{}", "-".repeat(80));
        for entry in &entries {
            println!(
                "{:<26} {:<20} {:>14}  {}",
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.tx_type.as_str(),
                entry.amount,
                entry.reference_id.as_deref().unwrap_or("-")
            );
        }
        println!("{} entries", entries.len());
    }

    session.close().await;
    Ok(())
}

/// Reconcile one wallet, or every wallet of `owner` when no currency is given.
pub async fn reconcile(config: &MarketConfig, owner: &str, currency: Option<&str>) -> Result<()> {
    let session = Session::open(config).await?;
    let ledger = WalletLedger::new(&session.ctx);
    let wallets = match currency {
        Some(code) => vec![ledger.wallet(owner, code).await?],
        None => ledger.wallets(owner).await?,
    };

    let mut drifted = 0;
    for wallet in &wallets {
        let report = ledger.reconcile(&wallet.id).await?;
        if report.is_balanced() {
            println!(
                "✅ {} {}: {} entries, balances match",
                wallet.id, wallet.currency, report.entry_count
            );
        } else {
            drifted += 1;
            let (available, reserved) = report.drift();
            println!(
                "⚠️  {} {}: available drift {}, reserved drift {}",
                wallet.id, wallet.currency, available, reserved
            );
        }
    }

    session.close().await;
    if drifted > 0 {
        anyhow::bail!("{} wallet(s) do not reconcile with their ledger", drifted);
    }
    Ok(())
}
