// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the engine. Configuration is loaded from the environment at
//! startup by the composition root.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the local key store | `./wallet-data` |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint | mainnet-beta |
//! | `SUI_RPC_URL` | Sui JSON-RPC fullnode | Sui mainnet |
//! | `RPC_TIMEOUT_SECS` | Per-request RPC timeout | `30` |
//! | `CONFIRM_ATTEMPTS` | Confirmation polls for probabilistic-finality chains | `5` |
//! | `CONFIRM_INTERVAL_MS` | Spacing between confirmation polls | `2000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::chains::types::{NetworkConfig, SOLANA_MAINNET, SUI_MAINNET};
use crate::error::{WalletError, WalletResult};

/// Environment variable name for the local data directory.
///
/// Holds the redb database (`wallet.redb`) and the key-value pointer files.
/// The directory is expected to live on device-encrypted storage.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./wallet-data";

pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";
pub const SUI_RPC_URL_ENV: &str = "SUI_RPC_URL";

pub const RPC_TIMEOUT_ENV: &str = "RPC_TIMEOUT_SECS";
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

pub const CONFIRM_ATTEMPTS_ENV: &str = "CONFIRM_ATTEMPTS";
pub const CONFIRM_INTERVAL_ENV: &str = "CONFIRM_INTERVAL_MS";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Hard ceiling on derived accounts per wallet, enforced before
/// `create_next_account_at_path_index` is called.
pub const MAX_ACCOUNTS_PER_WALLET: usize = 10;

/// Bounded polling schedule for chains without instant finality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(2),
        }
    }
}

impl ConfirmPolicy {
    /// Upper bound on the time spent sleeping between polls.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub solana: NetworkConfig,
    pub sui: NetworkConfig,
    pub rpc_timeout: Duration,
    pub confirm: ConfirmPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            solana: SOLANA_MAINNET,
            sui: SUI_MAINNET,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            confirm: ConfirmPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> WalletResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> WalletResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(SOLANA_RPC_URL_ENV) {
            config.solana.rpc_url = validate_rpc_url(&raw)?.into();
        }
        if let Some(raw) = lookup(SUI_RPC_URL_ENV) {
            config.sui.rpc_url = validate_rpc_url(&raw)?.into();
        }
        if let Some(secs) = parse_number::<u64>(&lookup, RPC_TIMEOUT_ENV)? {
            config.rpc_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_number::<u32>(&lookup, CONFIRM_ATTEMPTS_ENV)? {
            config.confirm.attempts = attempts.max(1);
        }
        if let Some(ms) = parse_number::<u64>(&lookup, CONFIRM_INTERVAL_ENV)? {
            config.confirm.interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn validate_rpc_url(raw: &str) -> WalletResult<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| WalletError::Network(format!("Invalid RPC URL {raw}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(WalletError::Network(format!(
            "Unsupported RPC URL scheme `{other}`"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> WalletResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| WalletError::Network(format!("{key} must be a number, got `{raw}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.confirm.attempts, 5);
        assert_eq!(config.confirm.interval, Duration::from_secs(2));
        assert_eq!(config.rpc_timeout, DEFAULT_RPC_TIMEOUT);
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (DATA_DIR_ENV, "/tmp/wallet"),
            (SUI_RPC_URL_ENV, "http://127.0.0.1:9000"),
            (CONFIRM_ATTEMPTS_ENV, "3"),
            (CONFIRM_INTERVAL_ENV, "250"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/wallet"));
        assert_eq!(config.sui.rpc_url, "http://127.0.0.1:9000/");
        assert_eq!(config.confirm.attempts, 3);
        assert_eq!(config.confirm.max_wait(), Duration::from_millis(750));
    }

    #[test]
    fn rejects_non_http_rpc_url() {
        let result = EngineConfig::from_lookup(lookup_from(&[(SOLANA_RPC_URL_ENV, "ftp://x")]));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_numeric_attempts() {
        let result = EngineConfig::from_lookup(lookup_from(&[(CONFIRM_ATTEMPTS_ENV, "many")]));
        assert!(result.is_err());
    }
}
