//! Shared service context
//!
//! Holds the pool, the activity log and the notifier. Side effects gathered
//! during a transaction are handed to [`MarketContext::dispatch`] only after
//! the commit succeeded.

use crate::error::MarketResult;
use crate::notify::{Notifier, TracingNotifier};
use lendmarket_core::{ActivityRecord, Currency, Notification};
use lendmarket_persistence::{ActivityLog, Database};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::warn;

/// Business rules that come from configuration
#[derive(Debug, Clone)]
pub struct MarketSettings {
    /// Currency used when a loan request names none
    pub default_currency: String,
    pub max_term_months: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            default_currency: "HTG".to_string(),
            max_term_months: 360,
        }
    }
}

/// Activity records and notifications produced by one operation.
#[derive(Debug, Default)]
pub struct SideEffects {
    activity: Vec<ActivityRecord>,
    notifications: Vec<Notification>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: ActivityRecord) {
        self.activity.push(record);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

pub struct MarketContext {
    pool: SqlitePool,
    activity: Arc<ActivityLog>,
    notifier: Arc<dyn Notifier>,
    settings: MarketSettings,
}

impl MarketContext {
    pub fn new(db: &Database, notifier: Arc<dyn Notifier>, settings: MarketSettings) -> Self {
        Self::from_parts(db.pool().clone(), db.activity(), notifier, settings)
    }

    pub fn from_parts(
        pool: SqlitePool,
        activity: Arc<ActivityLog>,
        notifier: Arc<dyn Notifier>,
        settings: MarketSettings,
    ) -> Self {
        Self {
            pool,
            activity,
            notifier,
            settings,
        }
    }

    /// Context that logs notifications instead of delivering them
    pub fn with_tracing(db: &Database, settings: MarketSettings) -> Self {
        Self::new(db, Arc::new(TracingNotifier), settings)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    pub fn currency(&self, code: &str) -> Currency {
        Currency::from_code(code)
    }

    /// Pooled connection for reads outside a transaction
    pub async fn conn(&self) -> MarketResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn begin(&self) -> MarketResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Best-effort delivery after commit. Failures are logged and dropped.
    pub fn dispatch(&self, effects: SideEffects) {
        for record in effects.activity {
            let action = record.action.clone();
            if let Err(e) = self.activity.append(record) {
                warn!(action = %action, error = %e, "failed to append activity record");
            }
        }
        for notification in &effects.notifications {
            if let Err(e) = self.notifier.notify(notification) {
                warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    error = %e,
                    "failed to deliver notification"
                );
            }
        }
    }
}
