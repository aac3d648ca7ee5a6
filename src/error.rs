// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Engine-wide error taxonomy.
//!
//! Every public operation returns a [`WalletResult`]. Callers branch on the
//! variant instead of matching strings; storage and transport failures are
//! wrapped so the original cause stays reachable through `source()`.

use crate::chains::rpc::RpcError;
use crate::storage::StoreError;

/// Which side of a transfer could not be covered by the spendable balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    /// The requested amount itself exceeds the balance.
    Amount,
    /// The amount fits, but not together with the network fee.
    Fee,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shortfall::Amount => write!(f, "transfer amount"),
            Shortfall::Fee => write!(f, "network fee"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("Token not found")]
    TokenNotFound,

    #[error("Insufficient balance for {shortfall}")]
    InsufficientBalance { shortfall: Shortfall },

    #[error("Mnemonic not found for wallet {0}")]
    MnemonicNotFound(String),

    #[error("No signing key stored for address {0}")]
    KeyNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Wallet already holds the maximum of {0} accounts")]
    AccountLimitReached(usize),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Transaction {0} not confirmed yet")]
    ConfirmationTimeout(String),

    #[error("Data integrity check failed")]
    IntegrityCheckFailed,

    #[error("Malformed encrypted data: {0}")]
    MalformedCiphertext(String),

    #[error("A transfer is already in flight for this session")]
    TransferInFlight,

    #[error("Operation cancelled before broadcast")]
    Cancelled,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl WalletError {
    pub fn insufficient(shortfall: Shortfall) -> Self {
        Self::InsufficientBalance { shortfall }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Network(_) | WalletError::ConfirmationTimeout(_))
    }
}

impl From<RpcError> for WalletError {
    fn from(e: RpcError) -> Self {
        WalletError::Network(e.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
