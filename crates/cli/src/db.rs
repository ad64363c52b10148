//! Database opening and status

use crate::config::MarketConfig;
use anyhow::{Context, Result};
use lendmarket_persistence::Database;
use sqlx::SqlitePool;

/// Open (creating and migrating if needed) the configured database
pub async fn open(config: &MarketConfig) -> Result<Database> {
    if let Some(parent) = sqlite_file(&config.database_url).and_then(|p| p.parent().map(|p| p.to_path_buf())) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(&parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Database::open(&config.database_url, &config.activity_dir, &config.pool_settings())
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))
}

/// File path behind a `sqlite:` url, if it names one
fn sqlite_file(url: &str) -> Option<std::path::PathBuf> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next()?;
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(std::path::PathBuf::from(path))
}

pub async fn init(config: &MarketConfig) -> Result<()> {
    let db = open(config).await?;
    println!("📦 Database ready at {}", config.database_url);
    println!("📝 Activity log in {}", config.activity_dir.display());
    db.pool().close().await;
    Ok(())
}

pub async fn show_status(config: &MarketConfig) -> Result<()> {
    let db = open(config).await?;
    let pool = db.pool();

    println!("📊 Database Status");
    println!("   URL: {}", config.database_url);
    println!();
    for (label, table) in [
        ("Wallets", "wallets"),
        ("Loans", "loans"),
        ("Offers", "loan_offers"),
        ("Installments", "loan_repayments"),
        ("Transactions", "transactions"),
    ] {
        println!("   {:<14}{}", format!("{}:", label), count(pool, table).await?);
    }

    let files = db.activity().list_files()?;
    println!("   {:<14}{}", "Log files:", files.len());
    pool.close().await;
    Ok(())
}

async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file() {
        assert_eq!(
            sqlite_file("sqlite:data/lendmarket.db?mode=rwc"),
            Some(std::path::PathBuf::from("data/lendmarket.db"))
        );
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://x"), None);
    }

    #[tokio::test]
    async fn test_init_creates_file_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = MarketConfig {
            database_url: format!("sqlite:{}/nested/market.db?mode=rwc", dir.path().display()),
            activity_dir: dir.path().join("activity"),
            ..MarketConfig::default()
        };
        init(&config).await.unwrap();
        assert!(dir.path().join("nested/market.db").exists());
        assert!(dir.path().join("activity").exists());
    }
}
