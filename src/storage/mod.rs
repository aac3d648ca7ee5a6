// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Key Store
//!
//! Persistent state for the engine, all under one data directory that is
//! expected to sit on device-encrypted storage.
//!
//! ## Storage Layout
//!
//! ```text
//! <DATA_DIR>/
//!   wallet.redb          # wallet, account, secret, recent (+ index tables)
//!   kv/
//!     current-account-id # active-account pointer
//! ```
//!
//! The relational part is a single redb database; every multi-row write is
//! one redb write transaction, so readers never see a wallet without its
//! account and secret rows. The active-account pointer lives outside the
//! database and is written independently.

pub mod account_store;
pub mod database;
pub mod events;
pub mod kv;
pub mod paths;
pub mod recent_store;

pub use account_store::{
    AccountRow, AccountStore, ChainAddress, SecretRow, WalletRow, WalletSummary,
};
pub use database::StoreDb;
pub use events::{ChangeKind, StoreEvents, Table, TableChange};
pub use kv::{KvStore, CURRENT_ACCOUNT_ID_KEY};
pub use paths::StoragePaths;
pub use recent_store::{RecentRecipient, RecentStore, RECENT_LIMIT};

use std::io;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid key `{0}`")]
    InvalidKey(String),

    #[error("corrupt index entry: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

macro_rules! into_wallet_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for crate::error::WalletError {
                fn from(e: $source) -> Self {
                    crate::error::WalletError::Store(StoreError::from(e))
                }
            }
        )*
    };
}

into_wallet_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
);
