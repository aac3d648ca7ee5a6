// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain adapters behind one closed dispatch enum.
//!
//! Every supported chain implements the same capability set: address
//! validation, key derivation, message signing, transfer build/broadcast,
//! fee estimation, confirmation polling, and presentation metadata.
//! [`ChainOperations`] is a tagged union over the concrete adapters, so
//! adding a chain is a compile error everywhere a match is missing.

pub mod amount;
pub mod registry;
pub mod rpc;
pub mod solana;
pub mod sui;
pub mod types;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

pub use registry::ChainRegistry;
pub use solana::SolanaChain;
pub use sui::SuiChain;
pub use types::{FeeEstimate, NetworkConfig, TokenInfo};

/// Supported chain tags, as persisted in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Sui,
}

impl Chain {
    /// Every supported chain, in derivation order.
    pub const ALL: [Chain; 2] = [Chain::Solana, Chain::Sui];

    /// The chain whose address doubles as the cross-chain account id.
    pub const PRIMARY: Chain = Chain::Solana;

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Sui => "sui",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solana" => Ok(Chain::Solana),
            "sui" => Ok(Chain::Sui),
            other => Err(WalletError::InvalidAddress(format!("unknown chain `{other}`"))),
        }
    }
}

/// A usable signer: chain tag, public address, and chain-native secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ChainKey {
    pub chain: Chain,
    pub address: String,
    pub secret_key: Zeroizing<String>,
}

impl ChainKey {
    pub fn new(chain: Chain, address: String, secret_key: String) -> Self {
        Self {
            chain,
            address,
            secret_key: Zeroizing::new(secret_key),
        }
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKey")
            .field("chain", &self.chain)
            .field("address", &self.address)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A fully built and signed transfer, ready for broadcast.
#[derive(Debug, Clone)]
pub enum SignedTransfer {
    Solana(solana::SignedTransaction),
    Sui(sui::SignedTransaction),
}

impl SignedTransfer {
    pub fn chain(&self) -> Chain {
        match self {
            SignedTransfer::Solana(_) => Chain::Solana,
            SignedTransfer::Sui(_) => Chain::Sui,
        }
    }

    /// Recipient address the transfer pays.
    pub fn recipient(&self) -> &str {
        match self {
            SignedTransfer::Solana(tx) => &tx.recipient,
            SignedTransfer::Sui(tx) => &tx.recipient,
        }
    }

    /// Base units that will leave the sender, after any fee deduction.
    pub fn amount(&self) -> u64 {
        match self {
            SignedTransfer::Solana(tx) => tx.amount,
            SignedTransfer::Sui(tx) => tx.amount,
        }
    }
}

/// Closed dispatch over the concrete chain adapters.
#[derive(Clone)]
pub enum ChainOperations {
    Solana(SolanaChain),
    Sui(SuiChain),
}

impl ChainOperations {
    pub fn chain(&self) -> Chain {
        match self {
            ChainOperations::Solana(_) => Chain::Solana,
            ChainOperations::Sui(_) => Chain::Sui,
        }
    }

    /// Syntactic address check. Never touches the network.
    pub fn verify_address(&self, address: &str) -> bool {
        match self {
            ChainOperations::Solana(c) => c.verify_address(address),
            ChainOperations::Sui(c) => c.verify_address(address),
        }
    }

    /// Derive the key at `path_index` for this chain.
    pub fn generate_key_from_mnemonic(
        &self,
        mnemonic: &str,
        path_index: u32,
    ) -> WalletResult<ChainKey> {
        match self {
            ChainOperations::Solana(c) => c.generate_key_from_mnemonic(mnemonic, path_index),
            ChainOperations::Sui(c) => c.generate_key_from_mnemonic(mnemonic, path_index),
        }
    }

    /// Detached signature over the UTF-8 bytes of `message`.
    pub fn sign_message(&self, key: &ChainKey, message: &str) -> WalletResult<String> {
        self.ensure_key_chain(key)?;
        match self {
            ChainOperations::Solana(c) => c.sign_message(key, message),
            ChainOperations::Sui(c) => c.sign_message(key, message),
        }
    }

    /// Validate, check balances, build, and sign a transfer without sending it.
    pub async fn prepare_transfer(
        &self,
        from: &ChainKey,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
        fee_hint: Option<&FeeEstimate>,
    ) -> WalletResult<SignedTransfer> {
        self.ensure_key_chain(from)?;
        match self {
            ChainOperations::Solana(c) => c
                .prepare_transfer(from, to, ui_amount, token)
                .await
                .map(SignedTransfer::Solana),
            ChainOperations::Sui(c) => c
                .prepare_transfer(from, to, ui_amount, token, fee_hint)
                .await
                .map(SignedTransfer::Sui),
        }
    }

    /// Submit a signed transfer and return the network's transaction id.
    pub async fn broadcast(&self, transfer: &SignedTransfer) -> WalletResult<String> {
        match (self, transfer) {
            (ChainOperations::Solana(c), SignedTransfer::Solana(tx)) => c.broadcast(tx).await,
            (ChainOperations::Sui(c), SignedTransfer::Sui(tx)) => c.broadcast(tx).await,
            (ops, tx) => Err(WalletError::TransactionRejected(format!(
                "{} transaction cannot be broadcast on {}",
                tx.chain(),
                ops.chain()
            ))),
        }
    }

    /// Build, sign, and broadcast in one call.
    pub async fn transfer(
        &self,
        from: &ChainKey,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
        fee_hint: Option<&FeeEstimate>,
    ) -> WalletResult<String> {
        let signed = self
            .prepare_transfer(from, to, ui_amount, token, fee_hint)
            .await?;
        self.broadcast(&signed).await
    }

    pub async fn get_fee_estimate(
        &self,
        from: &str,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
    ) -> WalletResult<FeeEstimate> {
        match self {
            ChainOperations::Solana(c) => c.get_fee_estimate(token),
            ChainOperations::Sui(c) => c.get_fee_estimate(from, to, ui_amount, token).await,
        }
    }

    /// `Ok(true)` confirmed, `Ok(false)` not yet, `Err` for network failure
    /// or on-chain rejection.
    pub async fn confirm_transaction(&self, signature: &str) -> WalletResult<bool> {
        match self {
            ChainOperations::Solana(c) => c.confirm_transaction(signature).await,
            ChainOperations::Sui(c) => c.confirm_transaction(signature).await,
        }
    }

    pub fn explorer_url_for_tx(&self, signature: &str) -> String {
        self.network().tx_url(signature)
    }

    pub fn network(&self) -> &NetworkConfig {
        match self {
            ChainOperations::Solana(c) => c.network(),
            ChainOperations::Sui(c) => c.network(),
        }
    }

    pub fn logo_uri(&self) -> &'static str {
        match self {
            ChainOperations::Solana(_) => solana::LOGO_URI,
            ChainOperations::Sui(_) => sui::LOGO_URI,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChainOperations::Solana(_) => "Solana",
            ChainOperations::Sui(_) => "Sui",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ChainOperations::Solana(_) => "SOL",
            ChainOperations::Sui(_) => "SUI",
        }
    }

    /// Token descriptor for the chain's native asset.
    pub fn native_token(&self) -> TokenInfo {
        match self {
            ChainOperations::Solana(_) => solana::native_token(),
            ChainOperations::Sui(_) => sui::native_token(),
        }
    }

    fn ensure_key_chain(&self, key: &ChainKey) -> WalletResult<()> {
        if key.chain != self.chain() {
            return Err(WalletError::InvalidSecretKey(format!(
                "{} key used with {} adapter",
                key.chain,
                self.chain()
            )));
        }
        Ok(())
    }
}
