// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the database file | `./data` |
//! | `SESSION_SECRET` | HMAC secret for session tokens | Required |
//! | `SESSION_TTL_SECS` | Session lifetime | `86400` |
//! | `WALLET_ENCRYPTION_KEY` | Master key for custodial keys | Unset (wallet key use fails) |
//! | `SHAPE_MAINNET_RPC_URL` | Shape mainnet RPC | public endpoint |
//! | `SHAPE_SEPOLIA_RPC_URL` | Shape Sepolia RPC | public endpoint |
//! | `DEFAULT_CHAIN_ID` | Chain for balances and withdrawals | `360` |
//! | `INVEST_CHAIN_ID` | Chain for manual pool investments | `11011` |
//! | `PROOF_MAX_AGE_SECS` | Ownership proof validity window | `300` |
//! | `PROOF_ENFORCE_REPLAY` | Enforce proof expiry and single-use nonces | `true` |
//! | `AUTO_INVEST_ENABLED` | Start the auto-invest scheduler at boot | `false` |
//! | `AUTO_INVEST_INTERVAL_SECS` | Scheduler interval | `60` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{SHAPE_MAINNET, SHAPE_SEPOLIA};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
/// Master key for custodial private keys. Never logged.
pub const WALLET_ENCRYPTION_KEY_ENV: &str = "WALLET_ENCRYPTION_KEY";
pub const MAINNET_RPC_ENV: &str = "SHAPE_MAINNET_RPC_URL";
pub const SEPOLIA_RPC_ENV: &str = "SHAPE_SEPOLIA_RPC_URL";
pub const DEFAULT_CHAIN_ENV: &str = "DEFAULT_CHAIN_ID";
pub const INVEST_CHAIN_ENV: &str = "INVEST_CHAIN_ID";
pub const PROOF_MAX_AGE_ENV: &str = "PROOF_MAX_AGE_SECS";
pub const PROOF_ENFORCE_REPLAY_ENV: &str = "PROOF_ENFORCE_REPLAY";
pub const AUTO_INVEST_ENABLED_ENV: &str = "AUTO_INVEST_ENABLED";
pub const AUTO_INVEST_INTERVAL_ENV: &str = "AUTO_INVEST_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "custody.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub wallet_encryption_key: Option<String>,
    pub mainnet_rpc_url: String,
    pub sepolia_rpc_url: String,
    pub default_chain_id: u64,
    pub invest_chain_id: u64,
    pub proof_max_age: Duration,
    pub enforce_replay: bool,
    pub auto_invest_enabled: bool,
    pub auto_invest_interval: Duration,
    /// Certificate and key PEM paths
    pub tls: Option<(PathBuf, PathBuf)>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("default_chain_id", &self.default_chain_id)
            .field("invest_chain_id", &self.invest_chain_id)
            .field("enforce_replay", &self.enforce_replay)
            .field("auto_invest_enabled", &self.auto_invest_enabled)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let session_secret = get(SESSION_SECRET_ENV).ok_or(ConfigError::Missing(SESSION_SECRET_ENV))?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&get, PORT_ENV, 8080)?,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string())),
            session_secret,
            session_ttl: Duration::from_secs(parse(&get, SESSION_TTL_ENV, 86_400)?),
            wallet_encryption_key: get(WALLET_ENCRYPTION_KEY_ENV),
            mainnet_rpc_url: get(MAINNET_RPC_ENV)
                .unwrap_or_else(|| SHAPE_MAINNET.default_rpc_url.to_string()),
            sepolia_rpc_url: get(SEPOLIA_RPC_ENV)
                .unwrap_or_else(|| SHAPE_SEPOLIA.default_rpc_url.to_string()),
            default_chain_id: parse(&get, DEFAULT_CHAIN_ENV, SHAPE_MAINNET.chain_id)?,
            invest_chain_id: parse(&get, INVEST_CHAIN_ENV, SHAPE_SEPOLIA.chain_id)?,
            proof_max_age: Duration::from_secs(parse(&get, PROOF_MAX_AGE_ENV, 300)?),
            enforce_replay: parse(&get, PROOF_ENFORCE_REPLAY_ENV, true)?,
            auto_invest_enabled: parse(&get, AUTO_INVEST_ENABLED_ENV, false)?,
            auto_invest_interval: Duration::from_secs(parse(&get, AUTO_INVEST_INTERVAL_ENV, 60)?),
            tls,
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
