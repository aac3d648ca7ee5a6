// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Send flow.
//!
//! A send has two phases with different cancellation rules:
//!
//! 1. **Prepare** (key lookup, validation, balance checks, build, sign).
//!    Races the caller's [`CancellationToken`]; abandoning the flow here
//!    leaves nothing behind.
//! 2. **Broadcast and confirm**. Runs on a detached task. Once the signed
//!    transaction is handed over, dropping the caller's future or
//!    cancelling the token has no effect; the task broadcasts, records the
//!    recipient, and polls for finality to the end.
//!
//! A [`SendGuard`] stays held until phase 2 finishes, so a re-entrant
//! confirm press from the same screen session is refused instead of
//! producing a second broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::chains::{Chain, ChainOperations, ChainRegistry, FeeEstimate, SignedTransfer, TokenInfo};
use crate::error::{WalletError, WalletResult};
use crate::storage::{AccountStore, RecentRecipient, RecentStore};

// =============================================================================
// In-flight guard
// =============================================================================

/// One-send-at-a-time guard for a screen session.
#[derive(Debug, Clone, Default)]
pub struct SendGuard {
    in_flight: Arc<AtomicBool>,
}

impl SendGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn acquire(&self) -> WalletResult<SendPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WalletError::TransferInFlight)?;
        Ok(SendPermit {
            in_flight: self.in_flight.clone(),
        })
    }
}

/// Releases the guard on drop.
#[derive(Debug)]
struct SendPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

// =============================================================================
// Request / result types
// =============================================================================

#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Sender address; its key must be in the account store.
    pub from_address: String,
    pub to_address: String,
    /// Decimal amount in token units.
    pub ui_amount: String,
    pub token: Option<TokenInfo>,
    /// A quote previously returned by [`TransferService::estimate_fee`].
    pub fee_hint: Option<FeeEstimate>,
}

/// Terminal confirmation outcome that is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Confirmed,
    /// Not confirmed within the polling budget; it may still land.
    Pending,
}

/// A broadcast transfer whose confirmation is still running.
#[derive(Debug)]
pub struct PendingTransfer {
    pub chain: Chain,
    pub signature: String,
    pub explorer_url: String,
    confirmation: oneshot::Receiver<WalletResult<TransferStatus>>,
}

impl PendingTransfer {
    /// Wait for the confirmation loop.
    ///
    /// Dropping a `PendingTransfer` without waiting does not stop it.
    pub async fn wait(self) -> WalletResult<TransferStatus> {
        self.confirmation.await.map_err(|_| {
            WalletError::Network(format!("confirmation of {} was interrupted", self.signature))
        })?
    }

    /// Like [`wait`](Self::wait), but `Pending` becomes `ConfirmationTimeout`.
    pub async fn require_confirmed(self) -> WalletResult<()> {
        let signature = self.signature.clone();
        match self.wait().await? {
            TransferStatus::Confirmed => Ok(()),
            TransferStatus::Pending => Err(WalletError::ConfirmationTimeout(signature)),
        }
    }
}

// =============================================================================
// TransferService
// =============================================================================

#[derive(Clone)]
pub struct TransferService {
    accounts: AccountStore,
    recents: RecentStore,
    chains: ChainRegistry,
}

impl TransferService {
    pub fn new(accounts: AccountStore, recents: RecentStore, chains: ChainRegistry) -> Self {
        Self {
            accounts,
            recents,
            chains,
        }
    }

    /// Fee quote for a transfer from one of this device's addresses.
    pub async fn estimate_fee(
        &self,
        from_address: &str,
        to_address: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
    ) -> WalletResult<FeeEstimate> {
        let key = self.accounts.get_chain_key_for_address(from_address)?;
        self.chains
            .get(key.chain)
            .get_fee_estimate(&key.address, to_address, ui_amount, token)
            .await
    }

    /// Prepare, broadcast, and start confirming a transfer.
    ///
    /// Returns once the network accepted the transaction. Errors before
    /// that point mean nothing was broadcast.
    pub async fn send(
        &self,
        guard: &SendGuard,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> WalletResult<PendingTransfer> {
        let permit = guard.acquire()?;

        let key = self.accounts.get_chain_key_for_address(&request.from_address)?;
        let ops = self.chains.get(key.chain);

        let signed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(chain = %key.chain, from = %key.address, "Transfer abandoned before broadcast");
                return Err(WalletError::Cancelled);
            }
            prepared = ops.prepare_transfer(
                &key,
                &request.to_address,
                &request.ui_amount,
                request.token.as_ref(),
                request.fee_hint.as_ref(),
            ) => prepared?,
        };

        let recent = RecentRecipient {
            address: signed.recipient().to_string(),
            chain: key.chain,
            from_address: key.address.clone(),
            date: Utc::now(),
        };
        let (signature_tx, signature_rx) = oneshot::channel();
        let (status_tx, status_rx) = oneshot::channel();
        tokio::spawn(broadcast_and_confirm(
            ops.clone(),
            signed,
            self.recents.clone(),
            recent,
            permit,
            signature_tx,
            status_tx,
        ));

        let signature = signature_rx
            .await
            .map_err(|_| WalletError::Network("broadcast task ended unexpectedly".to_string()))??;

        Ok(PendingTransfer {
            chain: key.chain,
            explorer_url: ops.explorer_url_for_tx(&signature),
            signature,
            confirmation: status_rx,
        })
    }
}

async fn broadcast_and_confirm(
    ops: ChainOperations,
    signed: SignedTransfer,
    recents: RecentStore,
    recent: RecentRecipient,
    permit: SendPermit,
    signature_tx: oneshot::Sender<WalletResult<String>>,
    status_tx: oneshot::Sender<WalletResult<TransferStatus>>,
) {
    let signature = match ops.broadcast(&signed).await {
        Ok(signature) => signature,
        Err(e) => {
            tracing::warn!(chain = %ops.chain(), error = %e, "Broadcast failed");
            drop(permit);
            let _ = signature_tx.send(Err(e));
            return;
        }
    };
    let _ = signature_tx.send(Ok(signature.clone()));

    if let Err(e) = recents.add_recent(&recent) {
        tracing::warn!(error = %e, "Failed to record recent recipient");
    }

    let status = ops.confirm_transaction(&signature).await.map(|confirmed| {
        if confirmed {
            TransferStatus::Confirmed
        } else {
            TransferStatus::Pending
        }
    });
    match &status {
        Ok(status) => tracing::info!(chain = %ops.chain(), %signature, ?status, "Transfer finished"),
        Err(e) => tracing::warn!(chain = %ops.chain(), %signature, error = %e, "Confirmation failed"),
    }

    drop(permit);
    let _ = status_tx.send(status);
}
