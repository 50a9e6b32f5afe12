//! Process configuration read from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PROCURA_BIND_ADDR` | `0.0.0.0:8080` | Listen address |
//! | `DATABASE_URL` | unset | Postgres URL; in-memory stores when unset |
//! | `PROCURA_RECEIVE_MAX_ATTEMPTS` | `3` | Attempts per receiving batch on conflict |
//! | `PROCURA_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `PROCURA_VENDOR_IDS` | empty | Comma-separated vendor UUIDs (in-memory mode) |
//! | `PROCURA_CATALOG_ITEM_IDS` | empty | Comma-separated catalog item UUIDs (in-memory mode) |

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use procura_core::{InventoryItemId, VendorId};
use procura_infra::RetryPolicy;
use procura_observability::{LogConfig, LogFormat, ParseLogFormatError};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PROCURA_BIND_ADDR `{value}` is not a socket address: {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("PROCURA_RECEIVE_MAX_ATTEMPTS must be a positive integer (got `{0}`)")]
    InvalidMaxAttempts(String),

    #[error("PROCURA_LOG_FORMAT: {0}")]
    InvalidLogFormat(#[from] ParseLogFormatError),

    #[error("{var} contains an invalid id `{value}`")]
    InvalidId { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
    pub log: LogConfig,
    /// Seed data for the in-memory vendor directory.
    pub vendor_ids: Vec<VendorId>,
    /// Seed data for the in-memory catalog.
    pub catalog_item_ids: Vec<InventoryItemId>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            retry: RetryPolicy::default(),
            log: LogConfig::default(),
            vendor_ids: Vec::new(),
            catalog_item_ids: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_value = var("PROCURA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_value.clone(),
                source,
            })?;

        let retry = match var("PROCURA_RECEIVE_MAX_ATTEMPTS") {
            None => RetryPolicy::default(),
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => RetryPolicy::new(n),
                _ => return Err(ConfigError::InvalidMaxAttempts(raw)),
            },
        };

        let format = match var("PROCURA_LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            retry,
            log: LogConfig {
                format,
                ..LogConfig::default()
            },
            vendor_ids: parse_ids("PROCURA_VENDOR_IDS", var("PROCURA_VENDOR_IDS"))?,
            catalog_item_ids: parse_ids("PROCURA_CATALOG_ITEM_IDS", var("PROCURA_CATALOG_ITEM_IDS"))?,
        })
    }
}

fn parse_ids<T: FromStr>(var: &'static str, raw: Option<String>) -> Result<Vec<T>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidId {
                var,
                value: s.to_string(),
            })
        })
        .collect()
}
