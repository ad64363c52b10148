//! CLI command handlers

pub mod activity;
pub mod loan;
pub mod offer;
pub mod repayment;
pub mod wallet;

use crate::config::MarketConfig;
use crate::db;
use anyhow::Result;
use lendmarket_business::MarketContext;
use lendmarket_persistence::Database;
use serde::Serialize;

/// Open database plus the service context built on it
pub struct Session {
    pub db: Database,
    pub ctx: MarketContext,
}

impl Session {
    pub async fn open(config: &MarketConfig) -> Result<Self> {
        let db = db::open(config).await?;
        let ctx = MarketContext::with_tracing(&db, config.market_settings());
        Ok(Self { db, ctx })
    }

    pub async fn close(self) {
        self.db.pool().close().await;
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explicit currency, or the configured default
pub fn currency_or_default(config: &MarketConfig, currency: Option<&str>) -> String {
    match currency {
        Some(code) if !code.trim().is_empty() => code.trim().to_uppercase(),
        _ => config.default_currency.to_uppercase(),
    }
}
