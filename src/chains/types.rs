// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain types and constants.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Per-chain network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// JSON-RPC endpoint URL (overridable from the environment)
    pub rpc_url: Cow<'static, str>,
    /// Block explorer base URL; transactions live under `{explorer_url}/tx/`
    pub explorer_url: &'static str,
}

impl NetworkConfig {
    pub fn tx_url(&self, signature: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, signature)
    }
}

/// Solana mainnet-beta configuration.
pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "Solana Mainnet",
    rpc_url: Cow::Borrowed("https://api.mainnet-beta.solana.com"),
    explorer_url: "https://solscan.io",
};

/// Sui mainnet fullnode configuration.
pub const SUI_MAINNET: NetworkConfig = NetworkConfig {
    name: "Sui Mainnet",
    rpc_url: Cow::Borrowed("https://fullnode.mainnet.sui.io:443"),
    explorer_url: "https://suiscan.xyz/mainnet",
};

/// Token the caller wants to move.
///
/// `address` is the mint (Solana) or coin type (Sui). The native asset is
/// addressed by the chain's native token address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(
        address: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals,
        }
    }
}

/// Network fee quote, as a decimal string in the chain's native symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub fee: String,
    pub symbol: String,
}
