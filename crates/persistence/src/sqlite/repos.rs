//! Repository implementations for SQLite
//!
//! Every function takes a `&mut SqliteConnection` so the same calls work on a
//! pooled connection or inside a `sqlx::Transaction` (`&mut *tx`).
//!
//! SQLite has no `SELECT ... FOR UPDATE`. `lock` performs a no-op write on the
//! row instead: the first write inside a transaction takes the database write
//! lock, so anything read after `lock` cannot change underneath the caller.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{NaiveDate, Utc};
use lendmarket_core::{
    generate_id, LedgerEntry, Loan, LoanOffer, LoanRepayment, LoanStatus, OfferStatus,
    RepaymentStatus, Wallet,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Wallet Repository
// ============================================================================

pub struct WalletRepo;

impl WalletRepo {
    pub async fn insert(conn: &mut SqliteConnection, wallet: &Wallet) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, currency, available_balance, reserved_balance, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.user_id)
        .bind(&wallet.currency)
        .bind(wallet.available_balance.to_string())
        .bind(wallet.reserved_balance.to_string())
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Wallet> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Wallet", id))?
            .try_into()
    }

    pub async fn find(
        conn: &mut SqliteConnection,
        user_id: &str,
        currency: &str,
    ) -> PersistenceResult<Option<Wallet>> {
        sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE user_id = ? AND currency = ?")
            .bind(user_id)
            .bind(currency)
            .fetch_optional(&mut *conn)
            .await?
            .map(Wallet::try_from)
            .transpose()
    }

    /// Wallets are created lazily on a user's first financial action.
    pub async fn get_or_create(
        conn: &mut SqliteConnection,
        user_id: &str,
        currency: &str,
    ) -> PersistenceResult<Wallet> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO wallets (id, user_id, currency, available_balance, reserved_balance, created_at, updated_at)
            VALUES (?, ?, ?, '0', '0', ?, ?)
            "#,
        )
        .bind(generate_id("WAL"))
        .bind(user_id)
        .bind(currency)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Self::find(conn, user_id, currency)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Wallet", &format!("{}:{}", user_id, currency)))
    }

    /// Take the row lock. Fails with `NotFound` if the wallet does not exist.
    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE wallets SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Wallet", id));
        }
        Ok(())
    }

    pub async fn update_balances(conn: &mut SqliteConnection, wallet: &Wallet) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE wallets SET available_balance = ?, reserved_balance = ?, updated_at = ? WHERE id = ?",
        )
        .bind(wallet.available_balance.to_string())
        .bind(wallet.reserved_balance.to_string())
        .bind(wallet.updated_at)
        .bind(&wallet.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Wallet", &wallet.id));
        }
        Ok(())
    }

    pub async fn list_by_user(conn: &mut SqliteConnection, user_id: &str) -> PersistenceResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE user_id = ? ORDER BY currency")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }

    pub async fn list_by_currency(conn: &mut SqliteConnection, currency: &str) -> PersistenceResult<Vec<Wallet>> {
        let rows = sqlx::query_as::<_, WalletRow>("SELECT * FROM wallets WHERE currency = ? ORDER BY id")
            .bind(currency)
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Wallet::try_from).collect()
    }
}

// ============================================================================
// Loan Repository
// ============================================================================

/// Optional filters for listing loans
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub borrower_id: Option<String>,
    pub lender_id: Option<String>,
    pub status: Option<LoanStatus>,
}

pub struct LoanRepo;

impl LoanRepo {
    pub async fn insert(conn: &mut SqliteConnection, loan: &Loan) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (id, borrower_id, lender_id, amount, currency, interest_rate, term_months,
                               purpose, status, start_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&loan.id)
        .bind(&loan.borrower_id)
        .bind(&loan.lender_id)
        .bind(loan.amount.to_string())
        .bind(&loan.currency)
        .bind(loan.interest_rate.to_string())
        .bind(loan.term_months as i64)
        .bind(&loan.purpose)
        .bind(loan.status.as_str())
        .bind(loan.start_date)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Loan> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Loan", id))?
            .try_into()
    }

    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE loans SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Loan", id));
        }
        Ok(())
    }

    /// Compare-and-set on status; returns `false` when the row was not in
    /// `expected`.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: &str,
        expected: LoanStatus,
        next: LoanStatus,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query("UPDATE loans SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(Utc::now())
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `requested -> active`, setting the lender and start date once.
    pub async fn activate(
        conn: &mut SqliteConnection,
        id: &str,
        lender_id: &str,
        start_date: NaiveDate,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET lender_id = ?, status = ?, start_date = ?, updated_at = ?
            WHERE id = ? AND status = ? AND lender_id IS NULL
            "#,
        )
        .bind(lender_id)
        .bind(LoanStatus::Active.as_str())
        .bind(start_date)
        .bind(Utc::now())
        .bind(id)
        .bind(LoanStatus::Requested.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list(conn: &mut SqliteConnection, filter: &LoanFilter) -> PersistenceResult<Vec<Loan>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM loans WHERE 1=1");
        if let Some(borrower) = &filter.borrower_id {
            qb.push(" AND borrower_id = ").push_bind(borrower.clone());
        }
        if let Some(lender) = &filter.lender_id {
            qb.push(" AND lender_id = ").push_bind(lender.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC, id");

        let rows = qb.build_query_as::<LoanRow>().fetch_all(&mut *conn).await?;
        rows.into_iter().map(Loan::try_from).collect()
    }
}

// ============================================================================
// Offer Repository
// ============================================================================

pub struct OfferRepo;

impl OfferRepo {
    pub async fn insert(conn: &mut SqliteConnection, offer: &LoanOffer) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_offers (id, loan_id, lender_id, amount, interest_rate, notes, status,
                                     rejection_reason, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.loan_id)
        .bind(&offer.lender_id)
        .bind(offer.amount.to_string())
        .bind(offer.interest_rate.to_string())
        .bind(&offer.notes)
        .bind(offer.status.as_str())
        .bind(&offer.rejection_reason)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<LoanOffer> {
        sqlx::query_as::<_, OfferRow>("SELECT * FROM loan_offers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("LoanOffer", id))?
            .try_into()
    }

    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE loan_offers SET updated_at = updated_at WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("LoanOffer", id));
        }
        Ok(())
    }

    pub async fn list_by_loan(conn: &mut SqliteConnection, loan_id: &str) -> PersistenceResult<Vec<LoanOffer>> {
        let rows = sqlx::query_as::<_, OfferRow>("SELECT * FROM loan_offers WHERE loan_id = ? ORDER BY id")
            .bind(loan_id)
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(LoanOffer::try_from).collect()
    }

    /// Pending offers sorted by id, the fixed lock order for cascades.
    pub async fn pending_for_loan(
        conn: &mut SqliteConnection,
        loan_id: &str,
    ) -> PersistenceResult<Vec<LoanOffer>> {
        let rows = sqlx::query_as::<_, OfferRow>(
            "SELECT * FROM loan_offers WHERE loan_id = ? AND status = ? ORDER BY id",
        )
        .bind(loan_id)
        .bind(OfferStatus::Pending.as_str())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LoanOffer::try_from).collect()
    }

    pub async fn list_by_lender(conn: &mut SqliteConnection, lender_id: &str) -> PersistenceResult<Vec<LoanOffer>> {
        let rows = sqlx::query_as::<_, OfferRow>(
            "SELECT * FROM loan_offers WHERE lender_id = ? ORDER BY created_at DESC, id",
        )
        .bind(lender_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LoanOffer::try_from).collect()
    }

    /// Compare-and-set from `pending`; returns `false` if the offer already
    /// left `pending`.
    pub async fn close(
        conn: &mut SqliteConnection,
        id: &str,
        next: OfferStatus,
        reason: Option<&str>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "UPDATE loan_offers SET status = ?, rejection_reason = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .bind(OfferStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_terms(
        conn: &mut SqliteConnection,
        id: &str,
        amount: Decimal,
        interest_rate: Decimal,
        notes: Option<&str>,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE loan_offers SET amount = ?, interest_rate = ?, notes = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(amount.to_string())
        .bind(interest_rate.to_string())
        .bind(notes)
        .bind(Utc::now())
        .bind(id)
        .bind(OfferStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("LoanOffer", id));
        }
        Ok(())
    }
}

// ============================================================================
// Repayment Repository
// ============================================================================

pub struct RepaymentRepo;

impl RepaymentRepo {
    pub async fn insert_batch(conn: &mut SqliteConnection, rows: &[LoanRepayment]) -> PersistenceResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO loan_repayments (id, loan_id, installment_number, due_date, amount_due, \
             principal_amount, interest_amount, amount_paid, status, payment_date) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.id.clone())
                .push_bind(r.loan_id.clone())
                .push_bind(r.installment_number as i64)
                .push_bind(r.due_date)
                .push_bind(r.amount_due.to_string())
                .push_bind(r.principal_amount.to_string())
                .push_bind(r.interest_amount.to_string())
                .push_bind(r.amount_paid.to_string())
                .push_bind(r.status.as_str())
                .push_bind(r.payment_date);
        });
        qb.build().execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn get(
        conn: &mut SqliteConnection,
        loan_id: &str,
        installment_number: u32,
    ) -> PersistenceResult<LoanRepayment> {
        sqlx::query_as::<_, RepaymentRow>(
            "SELECT * FROM loan_repayments WHERE loan_id = ? AND installment_number = ?",
        )
        .bind(loan_id)
        .bind(installment_number as i64)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            PersistenceError::not_found("LoanRepayment", &format!("{}#{}", loan_id, installment_number))
        })?
        .try_into()
    }

    pub async fn list_by_loan(conn: &mut SqliteConnection, loan_id: &str) -> PersistenceResult<Vec<LoanRepayment>> {
        let rows = sqlx::query_as::<_, RepaymentRow>(
            "SELECT * FROM loan_repayments WHERE loan_id = ? ORDER BY installment_number",
        )
        .bind(loan_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LoanRepayment::try_from).collect()
    }

    /// Persist the mutable fields: amount paid, status and payment date.
    pub async fn save_progress(conn: &mut SqliteConnection, row: &LoanRepayment) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE loan_repayments SET amount_paid = ?, status = ?, payment_date = ? WHERE id = ?",
        )
        .bind(row.amount_paid.to_string())
        .bind(row.status.as_str())
        .bind(row.payment_date)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("LoanRepayment", &row.id));
        }
        Ok(())
    }

    pub async fn count_unpaid(conn: &mut SqliteConnection, loan_id: &str) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM loan_repayments WHERE loan_id = ? AND status != ?")
            .bind(loan_id)
            .bind(RepaymentStatus::Paid.as_str())
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Append-only: there is no update or delete.
pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn insert(conn: &mut SqliteConnection, entry: &LedgerEntry) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, wallet_id, tx_type, amount, reference_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.wallet_id)
        .bind(entry.tx_type.as_str())
        .bind(entry.amount.to_string())
        .bind(&entry.reference_id)
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn list_by_wallet(conn: &mut SqliteConnection, wallet_id: &str) -> PersistenceResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE wallet_id = ? ORDER BY created_at, rowid",
        )
        .bind(wallet_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    pub async fn list_by_reference(
        conn: &mut SqliteConnection,
        reference_id: &str,
    ) -> PersistenceResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE reference_id = ? ORDER BY created_at, rowid",
        )
        .bind(reference_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// How long a writer waits for the SQLite write lock
    pub busy_timeout: Duration,
    /// How long a caller waits for a pooled connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

pub async fn create_pool(database_url: &str, settings: &PoolSettings) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(settings.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Open (creating if needed) and migrate.
pub async fn init_database(database_url: &str, settings: &PoolSettings) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(database_url, settings).await?;
    run_migrations(&pool).await?;
    tracing::info!(url = %database_url, "database ready");
    Ok(pool)
}

/// Migrated in-memory database on a single long-lived connection.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to one connection that never expires.
pub async fn memory_pool() -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendmarket_core::{NewLoan, TransactionType};
    use rust_decimal_macros::dec;

    fn sample_loan(id: &str) -> Loan {
        NewLoan {
            amount: dec!(5000),
            currency: "HTG".into(),
            interest_rate: dec!(10),
            term_months: 6,
            purpose: "Shop inventory".into(),
        }
        .into_loan(id.into(), "bob".into())
    }

    #[tokio::test]
    async fn test_wallet_get_or_create_is_idempotent() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = WalletRepo::get_or_create(&mut conn, "alice", "HTG").await.unwrap();
        let second = WalletRepo::get_or_create(&mut conn, "alice", "HTG").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.available_balance, dec!(0));

        let other = WalletRepo::get_or_create(&mut conn, "alice", "USD").await.unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(WalletRepo::list_by_user(&mut conn, "alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_wallet_balance_update_and_lock() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut wallet = WalletRepo::get_or_create(&mut conn, "alice", "HTG").await.unwrap();
        wallet.credit(dec!(250.50)).unwrap();
        wallet.reserve(dec!(50.25)).unwrap();
        WalletRepo::update_balances(&mut conn, &wallet).await.unwrap();

        WalletRepo::lock(&mut conn, &wallet.id).await.unwrap();
        let loaded = WalletRepo::get_by_id(&mut conn, &wallet.id).await.unwrap();
        assert_eq!(loaded.available_balance, dec!(200.25));
        assert_eq!(loaded.reserved_balance, dec!(50.25));

        let err = WalletRepo::lock(&mut conn, "WAL_missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_loan_activation_is_compare_and_set() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let loan = sample_loan("LOAN_1");
        LoanRepo::insert(&mut conn, &loan).await.unwrap();

        let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(LoanRepo::activate(&mut conn, "LOAN_1", "alice", start).await.unwrap());
        assert!(!LoanRepo::activate(&mut conn, "LOAN_1", "carol", start).await.unwrap());

        let loaded = LoanRepo::get_by_id(&mut conn, "LOAN_1").await.unwrap();
        assert_eq!(loaded.status, LoanStatus::Active);
        assert_eq!(loaded.lender_id.as_deref(), Some("alice"));
        assert_eq!(loaded.start_date, Some(start));

        let filter = LoanFilter {
            status: Some(LoanStatus::Active),
            ..Default::default()
        };
        assert_eq!(LoanRepo::list(&mut conn, &filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_accepted_offer_enforced_by_index() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        LoanRepo::insert(&mut conn, &sample_loan("LOAN_1")).await.unwrap();
        for (id, lender) in [("OFR_A", "alice"), ("OFR_B", "carol")] {
            let offer = LoanOffer::new(id.into(), "LOAN_1".into(), lender.into(), dec!(5000), dec!(8), None);
            OfferRepo::insert(&mut conn, &offer).await.unwrap();
        }

        assert!(OfferRepo::close(&mut conn, "OFR_A", OfferStatus::Accepted, None).await.unwrap());
        // already closed
        assert!(!OfferRepo::close(&mut conn, "OFR_A", OfferStatus::Rejected, None).await.unwrap());

        let err = OfferRepo::close(&mut conn, "OFR_B", OfferStatus::Accepted, None)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let pending = OfferRepo::pending_for_loan(&mut conn, "LOAN_1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "OFR_B");
    }

    #[tokio::test]
    async fn test_repayments_batch_and_progress() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        LoanRepo::insert(&mut conn, &sample_loan("LOAN_1")).await.unwrap();

        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let rows: Vec<LoanRepayment> = lendmarket_core::schedule(dec!(300), dec!(0), 3, start, 2)
            .unwrap()
            .iter()
            .map(|i| LoanRepayment::from_installment(generate_id("RPY"), "LOAN_1", i))
            .collect();
        RepaymentRepo::insert_batch(&mut conn, &rows).await.unwrap();
        assert_eq!(RepaymentRepo::count_unpaid(&mut conn, "LOAN_1").await.unwrap(), 3);

        let mut first = RepaymentRepo::get(&mut conn, "LOAN_1", 1).await.unwrap();
        first.apply_payment(dec!(100), start).unwrap();
        RepaymentRepo::save_progress(&mut conn, &first).await.unwrap();
        assert_eq!(RepaymentRepo::count_unpaid(&mut conn, "LOAN_1").await.unwrap(), 2);

        let listed = RepaymentRepo::list_by_loan(&mut conn, "LOAN_1").await.unwrap();
        assert_eq!(listed[0].status, RepaymentStatus::Paid);
        assert_eq!(listed[2].installment_number, 3);

        assert!(RepaymentRepo::get(&mut conn, "LOAN_1", 9).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_transactions_append_and_list() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let wallet = WalletRepo::get_or_create(&mut conn, "alice", "HTG").await.unwrap();

        let entry = LedgerEntry::new(generate_id("TXN"), &wallet.id, TransactionType::Deposit, dec!(10), None);
        TransactionRepo::insert(&mut conn, &entry).await.unwrap();

        let listed = TransactionRepo::list_by_wallet(&mut conn, &wallet.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, entry.id);
        assert_eq!(listed[0].tx_type, TransactionType::Deposit);
        assert_eq!(listed[0].amount, dec!(10));
        assert_eq!(TransactionRepo::count(&mut conn).await.unwrap(), 1);
    }
}
