//! Trading Configuration
//!
//! Loads exchange credentials and journal settings from a JSON file. The
//! path is resolved explicit argument > `TRADING_SUPPORT_CONFIG` env var >
//! `config/config.json`, and required secrets are validated eagerly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "TRADING_SUPPORT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found ({path}); copy config/config.example.json and fill in your keys")]
    NotFound { path: PathBuf },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("api_key and api_secret must be provided in config")]
    MissingCredentials,
}

/// Header names carrying the signing material on authenticated requests.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthHeaders {
    /// Header name for the API key
    pub key: String,
    /// Header name for the HMAC signature
    pub signature: String,
    /// Header name for the request timestamp
    pub timestamp: String,
}

impl Default for AuthHeaders {
    fn default() -> Self {
        Self {
            key: "X-ACCESS-KEY".to_string(),
            signature: "X-ACCESS-SIGN".to_string(),
            timestamp: "X-ACCESS-TIMESTAMP".to_string(),
        }
    }
}

/// Process-wide configuration, read-only after load.
#[derive(Clone, Deserialize)]
pub struct TradingConfig {
    pub api_key: String,
    pub api_secret: String,

    /// Base REST endpoint for the Mercado Bitcoin v4 API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// If true, orders are recorded in the ledger without touching the exchange
    #[serde(default = "default_paper_trade")]
    pub paper_trade: bool,

    /// Telegram id to message pre-trade briefs; required by the plan flow
    #[serde(default)]
    pub telegram_target: Option<String>,

    #[serde(default)]
    pub auth_headers: AuthHeaders,

    /// Timezone used for displayed timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// SQLite URL backing the trade ledger
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl std::fmt::Debug for TradingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("base_url", &self.base_url)
            .field("paper_trade", &self.paper_trade)
            .field("telegram_target", &self.telegram_target)
            .field("timezone", &self.timezone)
            .field("database_url", &self.database_url)
            .finish()
    }
}

fn default_base_url() -> String {
    "https://api.mercadobitcoin.net/api/v4".to_string()
}

fn default_paper_trade() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_database_url() -> String {
    "sqlite://data/trades.db".to_string()
}

/// Load and validate the configuration.
///
/// `path` wins over the `TRADING_SUPPORT_CONFIG` env var, which wins over
/// the default `config/config.json`.
pub fn load_config(path: Option<&Path>) -> Result<TradingConfig, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    };

    if !config_path.exists() {
        return Err(ConfigError::NotFound { path: config_path });
    }

    let raw = std::fs::read_to_string(&config_path)?;
    let config: TradingConfig = serde_json::from_str(&raw)?;

    if config.api_key.is_empty() || config.api_secret.is_empty() {
        return Err(ConfigError::MissingCredentials);
    }

    Ok(config)
}
