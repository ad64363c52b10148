//! Wallet Ledger
//!
//! The only code that writes wallet balances. Every mutation locks the
//! wallet row, applies a [`Wallet`] operation, writes the row back and appends
//! a ledger entry, all on the caller's connection.
//!
//! The `*_in` functions run inside a transaction someone else owns so the
//! settlement coordinator can compose them. [`WalletLedger`] wraps them in a
//! transaction of their own.

use crate::context::{MarketContext, SideEffects};
use crate::error::{MarketError, MarketResult};
use chrono::Utc;
use lendmarket_core::{
    generate_id, reconcile, ActivityRecord, Currency, LedgerEntry, Reconciliation, TransactionType,
    Wallet,
};
use lendmarket_persistence::{TransactionRepo, WalletRepo};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

/// Reject non-positive amounts before a transaction opens.
pub(crate) fn validate_amount(amount: Decimal, what: &str) -> MarketResult<()> {
    if amount <= Decimal::ZERO {
        return Err(MarketError::Validation(format!(
            "{} must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

/// Round to the currency's minor units; reject amounts that round to zero.
pub(crate) fn to_minor(currency: &str, amount: Decimal) -> MarketResult<Decimal> {
    let rounded = Currency::from_code(currency).round(amount);
    if rounded <= Decimal::ZERO {
        return Err(MarketError::Validation(format!(
            "amount {} is below the smallest {} unit",
            amount, currency
        )));
    }
    Ok(rounded)
}

/// Fetch (creating if needed) and lock a user's wallet.
pub(crate) async fn lock_wallet_for(
    conn: &mut SqliteConnection,
    user_id: &str,
    currency: &str,
) -> MarketResult<Wallet> {
    let wallet = WalletRepo::get_or_create(conn, user_id, currency).await?;
    WalletRepo::lock(conn, &wallet.id).await?;
    Ok(WalletRepo::get_by_id(conn, &wallet.id).await?)
}

async fn load_locked(conn: &mut SqliteConnection, wallet_id: &str) -> MarketResult<Wallet> {
    WalletRepo::lock(conn, wallet_id).await?;
    Ok(WalletRepo::get_by_id(conn, wallet_id).await?)
}

async fn write(
    conn: &mut SqliteConnection,
    wallet: &mut Wallet,
    tx_type: TransactionType,
    amount: Decimal,
    reference_id: Option<&str>,
) -> MarketResult<()> {
    wallet.updated_at = Utc::now();
    WalletRepo::update_balances(conn, wallet).await?;
    let entry = LedgerEntry::new(generate_id("TXN"), &wallet.id, tx_type, amount, reference_id);
    TransactionRepo::insert(conn, &entry).await?;
    debug!(
        wallet_id = %wallet.id,
        tx_type = %tx_type,
        amount = %amount,
        available = %wallet.available_balance,
        reserved = %wallet.reserved_balance,
        "ledger entry"
    );
    Ok(())
}

/// available -> reserved. Not idempotent: each call reserves more.
pub(crate) async fn reserve_in(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    amount: Decimal,
    reference_id: Option<&str>,
) -> MarketResult<Wallet> {
    let mut wallet = load_locked(conn, wallet_id).await?;
    let amount = to_minor(&wallet.currency, amount)?;
    wallet.reserve(amount)?;
    write(conn, &mut wallet, TransactionType::ReservedIncrease, amount, reference_id).await?;
    Ok(wallet)
}

/// reserved -> available, clamped at the reserved balance. Returns the amount
/// actually released.
pub(crate) async fn release_in(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    amount: Decimal,
    reference_id: Option<&str>,
) -> MarketResult<Decimal> {
    let mut wallet = load_locked(conn, wallet_id).await?;
    let amount = to_minor(&wallet.currency, amount)?;
    let released = wallet.release(amount)?;
    if released < amount {
        warn!(
            wallet_id = %wallet_id,
            requested = %amount,
            released = %released,
            "release clamped at reserved balance"
        );
    }
    if released > Decimal::ZERO {
        write(conn, &mut wallet, TransactionType::ReservedDecrease, released, reference_id).await?;
    }
    Ok(released)
}

/// Convert the payer's reservation into a debit and credit the payee.
pub(crate) async fn settle_in(
    conn: &mut SqliteConnection,
    from_wallet_id: &str,
    to_wallet_id: &str,
    amount: Decimal,
    reference_id: Option<&str>,
) -> MarketResult<()> {
    if from_wallet_id == to_wallet_id {
        return Err(MarketError::Validation("cannot settle a wallet with itself".into()));
    }
    let mut from = load_locked(conn, from_wallet_id).await?;
    let mut to = load_locked(conn, to_wallet_id).await?;
    ensure_same_currency(&from, &to)?;

    let amount = to_minor(&from.currency, amount)?;
    from.consume_reserved(amount)?;
    to.credit(amount)?;

    write(conn, &mut from, TransactionType::LoanDisbursed, amount, reference_id).await?;
    write(conn, &mut to, TransactionType::LoanReceived, amount, reference_id).await?;
    Ok(())
}

/// Move available funds between wallets, e.g. an installment payment.
pub(crate) async fn transfer_in(
    conn: &mut SqliteConnection,
    from_wallet_id: &str,
    to_wallet_id: &str,
    amount: Decimal,
    reference_id: Option<&str>,
) -> MarketResult<()> {
    if from_wallet_id == to_wallet_id {
        return Err(MarketError::Validation("cannot transfer a wallet to itself".into()));
    }
    let mut from = load_locked(conn, from_wallet_id).await?;
    let mut to = load_locked(conn, to_wallet_id).await?;
    ensure_same_currency(&from, &to)?;

    let amount = to_minor(&from.currency, amount)?;
    from.debit(amount)?;
    to.credit(amount)?;

    write(conn, &mut from, TransactionType::Repayment, amount, reference_id).await?;
    write(conn, &mut to, TransactionType::RepaymentReceived, amount, reference_id).await?;
    Ok(())
}

fn ensure_same_currency(a: &Wallet, b: &Wallet) -> MarketResult<()> {
    if a.currency != b.currency {
        return Err(MarketError::Validation(format!(
            "currency mismatch: {} vs {}",
            a.currency, b.currency
        )));
    }
    Ok(())
}

/// Balances recomputed from the ledger next to the stored ones
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub wallet: Wallet,
    pub computed: Reconciliation,
    pub entry_count: usize,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.computed
            .matches(self.wallet.available_balance, self.wallet.reserved_balance)
    }

    /// Stored minus computed, as `(available, reserved)`
    pub fn drift(&self) -> (Decimal, Decimal) {
        (
            self.wallet.available_balance - self.computed.available,
            self.wallet.reserved_balance - self.computed.reserved,
        )
    }
}

pub struct WalletLedger<'a> {
    ctx: &'a MarketContext,
}

impl<'a> WalletLedger<'a> {
    pub fn new(ctx: &'a MarketContext) -> Self {
        Self { ctx }
    }

    /// External funds in. Creates the wallet on first use.
    pub async fn deposit(&self, actor_id: &str, currency: &str, amount: Decimal) -> MarketResult<Wallet> {
        validate_amount(amount, "deposit amount")?;
        let currency = currency.to_uppercase();
        let amount = to_minor(&currency, amount)?;

        let mut tx = self.ctx.begin().await?;
        let mut wallet = lock_wallet_for(&mut tx, actor_id, &currency).await?;
        wallet.credit(amount)?;
        write(&mut tx, &mut wallet, TransactionType::Deposit, amount, None).await?;
        tx.commit().await?;

        info!(wallet_id = %wallet.id, amount = %amount, "deposit");
        let mut effects = SideEffects::new();
        effects.record(
            ActivityRecord::new(actor_id, "deposit", &wallet.id)
                .with_metadata(json!({ "amount": amount, "currency": currency })),
        );
        self.ctx.dispatch(effects);
        Ok(wallet)
    }

    /// External funds out. Reserved funds cannot be withdrawn.
    pub async fn withdraw(&self, actor_id: &str, currency: &str, amount: Decimal) -> MarketResult<Wallet> {
        validate_amount(amount, "withdrawal amount")?;
        let currency = currency.to_uppercase();
        let amount = to_minor(&currency, amount)?;

        let mut tx = self.ctx.begin().await?;
        let mut wallet = lock_wallet_for(&mut tx, actor_id, &currency).await?;
        wallet.debit(amount)?;
        write(&mut tx, &mut wallet, TransactionType::Withdrawal, amount, None).await?;
        tx.commit().await?;

        info!(wallet_id = %wallet.id, amount = %amount, "withdrawal");
        let mut effects = SideEffects::new();
        effects.record(
            ActivityRecord::new(actor_id, "withdrawal", &wallet.id)
                .with_metadata(json!({ "amount": amount, "currency": currency })),
        );
        self.ctx.dispatch(effects);
        Ok(wallet)
    }

    pub async fn reserve(&self, wallet_id: &str, amount: Decimal, reference_id: Option<&str>) -> MarketResult<Wallet> {
        validate_amount(amount, "reserve amount")?;
        let mut tx = self.ctx.begin().await?;
        let wallet = reserve_in(&mut tx, wallet_id, amount, reference_id).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    pub async fn release(&self, wallet_id: &str, amount: Decimal, reference_id: Option<&str>) -> MarketResult<Decimal> {
        validate_amount(amount, "release amount")?;
        let mut tx = self.ctx.begin().await?;
        let released = release_in(&mut tx, wallet_id, amount, reference_id).await?;
        tx.commit().await?;
        Ok(released)
    }

    pub async fn settle(
        &self,
        from_wallet_id: &str,
        to_wallet_id: &str,
        amount: Decimal,
        reference_id: Option<&str>,
    ) -> MarketResult<()> {
        validate_amount(amount, "settlement amount")?;
        let mut tx = self.ctx.begin().await?;
        settle_in(&mut tx, from_wallet_id, to_wallet_id, amount, reference_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn wallet(&self, user_id: &str, currency: &str) -> MarketResult<Wallet> {
        let currency = currency.to_uppercase();
        WalletRepo::find(&mut *self.ctx.conn().await?, user_id, &currency)
            .await?
            .ok_or_else(|| MarketError::not_found("Wallet", &format!("{}:{}", user_id, currency)))
    }

    pub async fn wallet_by_id(&self, wallet_id: &str) -> MarketResult<Wallet> {
        Ok(WalletRepo::get_by_id(&mut *self.ctx.conn().await?, wallet_id).await?)
    }

    pub async fn wallets(&self, user_id: &str) -> MarketResult<Vec<Wallet>> {
        Ok(WalletRepo::list_by_user(&mut *self.ctx.conn().await?, user_id).await?)
    }

    pub async fn history(&self, wallet_id: &str) -> MarketResult<Vec<LedgerEntry>> {
        Ok(TransactionRepo::list_by_wallet(&mut *self.ctx.conn().await?, wallet_id).await?)
    }

    /// Every entry written under a loan or offer id, across wallets.
    pub async fn movements(&self, reference_id: &str) -> MarketResult<Vec<LedgerEntry>> {
        Ok(TransactionRepo::list_by_reference(&mut *self.ctx.conn().await?, reference_id).await?)
    }

    /// Recompute a wallet's balances from its ledger entries.
    pub async fn reconcile(&self, wallet_id: &str) -> MarketResult<ReconciliationReport> {
        let mut conn = self.ctx.conn().await?;
        let wallet = WalletRepo::get_by_id(&mut conn, wallet_id).await?;
        let entries = TransactionRepo::list_by_wallet(&mut conn, wallet_id).await?;

        let report = ReconciliationReport {
            computed: reconcile(&entries),
            entry_count: entries.len(),
            wallet,
        };
        if !report.is_balanced() {
            let (available, reserved) = report.drift();
            warn!(
                wallet_id = %wallet_id,
                available_drift = %available,
                reserved_drift = %reserved,
                "wallet does not reconcile with its ledger"
            );
        }
        Ok(report)
    }

    /// Sum of `available + reserved` over every wallet in a currency.
    pub async fn total_value(&self, currency: &str) -> MarketResult<Decimal> {
        let wallets =
            WalletRepo::list_by_currency(&mut *self.ctx.conn().await?, &currency.to_uppercase()).await?;
        Ok(wallets.iter().map(Wallet::total).sum())
    }
}
