//! CLI configuration, loaded from TOML

use lendmarket_business::MarketSettings;
use lendmarket_persistence::PoolSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub database_url: String,
    pub activity_dir: PathBuf,
    pub default_currency: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub log_level: String,
    pub max_term_months: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/lendmarket.db?mode=rwc".to_string(),
            activity_dir: PathBuf::from("data/activity"),
            default_currency: "HTG".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
            log_level: "info".to_string(),
            max_term_months: 360,
        }
    }
}

impl MarketConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: MarketConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url must not be empty".into()));
        }
        if self.default_currency.trim().is_empty() {
            return Err(ConfigError::Validation("default_currency must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation("max_connections must be positive".into()));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Validation("busy_timeout_ms must be positive".into()));
        }
        if self.max_term_months == 0 {
            return Err(ConfigError::Validation("max_term_months must be positive".into()));
        }
        Ok(())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..PoolSettings::default()
        }
    }

    pub fn market_settings(&self) -> MarketSettings {
        MarketSettings {
            default_currency: self.default_currency.to_uppercase(),
            max_term_months: self.max_term_months,
        }
    }
}
