//! # Lendmarket Persistence
//!
//! SQLite state plus a JSONL activity log.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Database                         │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────┐  │
//! │  │   SQLite    │   │    JSONL    │   │   Repos    │  │
//! │  │  (state)    │   │ (activity)  │   │  (queries) │  │
//! │  └─────────────┘   └─────────────┘   └────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust,ignore
//! use lendmarket_persistence::{Database, PoolSettings, WalletRepo};
//!
//! let db = Database::open("sqlite:data/lendmarket.db?mode=rwc", "data/activity", &PoolSettings::default()).await?;
//! let mut conn = db.pool().acquire().await?;
//! let wallet = WalletRepo::get_or_create(&mut conn, "alice", "HTG").await?;
//! ```

pub mod activity;
pub mod error;
pub mod sqlite;

pub use activity::{ActivityFilter, ActivityLog, ActivityReader};
pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{
    create_pool, init_database, memory_pool, run_migrations, LoanFilter, LoanRepo, OfferRepo,
    PoolSettings, RepaymentRepo, TransactionRepo, WalletRepo,
};

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

/// Database facade: connection pool plus activity log
pub struct Database {
    pool: SqlitePool,
    activity: Arc<ActivityLog>,
}

impl Database {
    /// Open, migrate and attach the activity log directory.
    pub async fn open<P: AsRef<Path>>(
        db_url: &str,
        activity_path: P,
        settings: &PoolSettings,
    ) -> PersistenceResult<Self> {
        let pool = init_database(db_url, settings).await?;
        let activity = Arc::new(ActivityLog::new(activity_path)?);
        Ok(Self { pool, activity })
    }

    /// Migrated in-memory database; used by tests.
    pub async fn in_memory<P: AsRef<Path>>(activity_path: P) -> PersistenceResult<Self> {
        let pool = memory_pool().await?;
        let activity = Arc::new(ActivityLog::new(activity_path)?);
        Ok(Self { pool, activity })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn activity(&self) -> Arc<ActivityLog> {
        Arc::clone(&self.activity)
    }

    pub fn activity_reader(&self) -> ActivityReader {
        ActivityReader::new(self.activity.base_path())
    }
}
