//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use kasir_core::refund::DEFAULT_UTC_OFFSET_MINUTES;
use kasir_core::validation::validate_tax_rate_bps;
use kasir_core::TaxRate;
use kasir_db::DbConfig;
use kasir_engine::config::DEFAULT_SYNC_BATCH_LIMIT;
use kasir_engine::EngineConfig;

/// API server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Tax rate in basis points (1100 = 11%)
    pub tax_rate_bps: u32,

    /// Let checkout take stock below zero
    pub allow_negative_stock: bool,

    /// Store timezone as minutes east of UTC (420 = WIB)
    pub utc_offset_minutes: i32,

    /// Max transactions accepted in one sync batch
    pub sync_batch_limit: usize,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `load` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = ApiConfig {
            http_port: parse_or(&lookup, "KASIR_HTTP_PORT", 8080)?,
            database_path: lookup("KASIR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./kasir.db")),
            db_max_connections: parse_or(&lookup, "KASIR_DB_MAX_CONNECTIONS", 5)?,
            tax_rate_bps: parse_or(&lookup, "KASIR_TAX_RATE_BPS", TaxRate::default().bps())?,
            allow_negative_stock: parse_or(&lookup, "KASIR_ALLOW_NEGATIVE_STOCK", false)?,
            utc_offset_minutes: parse_or(&lookup, "KASIR_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES)?,
            sync_batch_limit: parse_or(&lookup, "KASIR_SYNC_BATCH_LIMIT", DEFAULT_SYNC_BATCH_LIMIT)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("KASIR_DB_MAX_CONNECTIONS".to_string()));
        }
        if validate_tax_rate_bps(config.tax_rate_bps).is_err() {
            return Err(ConfigError::InvalidValue("KASIR_TAX_RATE_BPS".to_string()));
        }
        // UTC-12:00 .. UTC+14:00
        if !(-720..=840).contains(&config.utc_offset_minutes) {
            return Err(ConfigError::InvalidValue("KASIR_UTC_OFFSET_MINUTES".to_string()));
        }
        if config.sync_batch_limit == 0 {
            return Err(ConfigError::InvalidValue("KASIR_SYNC_BATCH_LIMIT".to_string()));
        }

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.db_max_connections)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tax_rate: TaxRate::from_bps(self.tax_rate_bps),
            allow_negative_stock: self.allow_negative_stock,
            utc_offset_minutes: self.utc_offset_minutes,
            sync_batch_limit: self.sync_batch_limit,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
