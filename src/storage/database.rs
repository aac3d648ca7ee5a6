// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded relational store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `wallet`: wallet_id → serialized WalletRow
//! - `account`: account_id → serialized AccountRow
//! - `secret`: address → serialized SecretRow
//! - `account_path_index`: `wallet_id|path_index_be` → account_id (unique)
//! - `secret_by_account`: `account_id|chain` → address
//! - `path_index_high_water`: wallet_id → highest path index ever assigned
//! - `recent`: address → serialized RecentRecipient
//! - `recent_by_chain`: `chain|!date_be|address` → address
//!
//! Foreign keys are enforced by the stores inside the same write
//! transaction that touches the parent rows.

use std::path::Path;

use redb::{Database, ReadTransaction, ReadableDatabase, TableDefinition, WriteTransaction};

use super::events::StoreEvents;
use super::StoreResult;
use crate::chains::Chain;

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallet");

pub(super) const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("account");

pub(super) const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secret");

/// Unique `(wallet_id, path_index)`; big-endian index keeps range scans ordered.
pub(super) const ACCOUNT_PATH_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("account_path_index");

pub(super) const SECRET_BY_ACCOUNT: TableDefinition<&str, &str> =
    TableDefinition::new("secret_by_account");

pub(super) const PATH_INDEX_HIGH_WATER: TableDefinition<&str, u32> =
    TableDefinition::new("path_index_high_water");

pub(super) const RECENT: TableDefinition<&str, &[u8]> = TableDefinition::new("recent");

pub(super) const RECENT_BY_CHAIN: TableDefinition<&[u8], &str> =
    TableDefinition::new("recent_by_chain");

// =============================================================================
// Index Key Helpers
// =============================================================================

pub(super) fn path_index_key(wallet_id: &str, path_index: u32) -> Vec<u8> {
    let mut key = path_index_prefix(wallet_id);
    key.extend_from_slice(&path_index.to_be_bytes());
    key
}

pub(super) fn path_index_prefix(wallet_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(wallet_id.len() + 1 + 4);
    prefix.extend_from_slice(wallet_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over one prefix.
pub(super) fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = Vec::with_capacity(prefix.len() + 20);
    end.extend_from_slice(prefix);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Decode the path index from an `account_path_index` key.
pub(super) fn path_index_from_key(key: &[u8]) -> Option<u32> {
    let tail = key.len().checked_sub(4)?;
    key[tail..].try_into().ok().map(u32::from_be_bytes)
}

pub(super) fn secret_by_account_key(account_id: &str, chain: Chain) -> String {
    format!("{account_id}|{chain}")
}

/// `chain | inverted_date_ms_be | address`; newest entries sort first.
pub(super) fn recent_index_key(chain: Chain, date_ms: i64, address: &str) -> Vec<u8> {
    let mut key = recent_prefix(chain);
    key.extend_from_slice(&(!date_ms as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(address.as_bytes());
    key
}

pub(super) fn recent_prefix(chain: Chain) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(chain.as_str().len() + 1);
    prefix.extend_from_slice(chain.as_str().as_bytes());
    prefix.push(b'|');
    prefix
}

// =============================================================================
// StoreDb
// =============================================================================

/// The database handle plus the change feed for its tables.
pub struct StoreDb {
    db: Database,
    events: StoreEvents,
}

impl StoreDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(SECRETS)?;
            let _ = write_txn.open_table(ACCOUNT_PATH_INDEX)?;
            let _ = write_txn.open_table(SECRET_BY_ACCOUNT)?;
            let _ = write_txn.open_table(PATH_INDEX_HIGH_WATER)?;
            let _ = write_txn.open_table(RECENT)?;
            let _ = write_txn.open_table(RECENT_BY_CHAIN)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "Opened wallet database");
        Ok(Self {
            db,
            events: StoreEvents::new(),
        })
    }

    pub fn events(&self) -> &StoreEvents {
        &self.events
    }

    pub(super) fn begin_read(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub(super) fn begin_write(&self) -> StoreResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }
}
