// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recently used recipients, per chain.
//!
//! Advisory data only. It shares the database file with the key store but
//! never touches the wallet, account, or secret tables.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::database::{prefix_end, recent_index_key, recent_prefix, StoreDb, RECENT, RECENT_BY_CHAIN};
use super::events::{ChangeKind, Table};
use super::StoreError;
use crate::chains::Chain;
use crate::error::WalletResult;

/// Rows returned by [`RecentStore::get_recent_for_chain`].
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRecipient {
    pub address: String,
    pub chain: Chain,
    pub from_address: String,
    pub date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RecentStore {
    db: Arc<StoreDb>,
}

impl RecentStore {
    pub fn new(db: Arc<StoreDb>) -> Self {
        Self { db }
    }

    /// Insert or replace the row for `recent.address`.
    pub fn add_recent(&self, recent: &RecentRecipient) -> WalletResult<()> {
        let json = serde_json::to_vec(recent)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECENT)?;
            let mut index = write_txn.open_table(RECENT_BY_CHAIN)?;

            let previous: Option<RecentRecipient> = match table.get(recent.address.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            if let Some(previous) = previous {
                let old_key = recent_index_key(
                    previous.chain,
                    previous.date.timestamp_millis(),
                    &previous.address,
                );
                index.remove(old_key.as_slice())?;
            }

            table.insert(recent.address.as_str(), json.as_slice())?;
            let key = recent_index_key(recent.chain, recent.date.timestamp_millis(), &recent.address);
            index.insert(key.as_slice(), recent.address.as_str())?;
        }
        write_txn.commit()?;

        self.db.events().emit(Table::Recent, ChangeKind::Insert);
        tracing::debug!(chain = %recent.chain, address = %recent.address, "Recorded recent recipient");
        Ok(())
    }

    /// Up to [`RECENT_LIMIT`] rows for `chain`, newest first.
    pub fn get_recent_for_chain(&self, chain: Chain) -> WalletResult<Vec<RecentRecipient>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(RECENT_BY_CHAIN)?;
        let table = read_txn.open_table(RECENT)?;

        let prefix = recent_prefix(chain);
        let end = prefix_end(&prefix);
        let mut rows = Vec::with_capacity(RECENT_LIMIT);
        for entry in index.range(prefix.as_slice()..end.as_slice())? {
            let (_, address) = entry?;
            let value = table.get(address.value())?.ok_or_else(|| {
                StoreError::Corrupt(format!("dangling recent entry {}", address.value()))
            })?;
            rows.push(serde_json::from_slice(value.value())?);
            if rows.len() >= RECENT_LIMIT {
                break;
            }
        }
        Ok(rows)
    }

    /// Drop every recent row.
    pub fn clear(&self) -> WalletResult<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.open_table(RECENT)?.retain(|_, _| false)?;
        write_txn.open_table(RECENT_BY_CHAIN)?.retain(|_, _| false)?;
        write_txn.commit()?;

        self.db.events().emit(Table::Recent, ChangeKind::Clear);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;
    use chrono::Duration;

    fn temp_store() -> (RecentStore, tempfile::TempDir) {
        let (db, dir) = temp_db();
        (RecentStore::new(Arc::new(db)), dir)
    }

    fn recent(address: &str, chain: Chain, seconds_ago: i64) -> RecentRecipient {
        RecentRecipient {
            address: address.to_string(),
            chain,
            from_address: "me".to_string(),
            date: Utc::now() - Duration::seconds(seconds_ago),
        }
    }

    #[test]
    fn newest_first_and_capped() {
        let (store, _dir) = temp_store();
        for i in 0..12 {
            store.add_recent(&recent(&format!("addr-{i:02}"), Chain::Sui, 100 - i)).unwrap();
        }

        let rows = store.get_recent_for_chain(Chain::Sui).unwrap();
        assert_eq!(rows.len(), RECENT_LIMIT);
        assert_eq!(rows[0].address, "addr-11");
        assert_eq!(rows[9].address, "addr-02");
    }

    #[test]
    fn chains_are_kept_apart() {
        let (store, _dir) = temp_store();
        store.add_recent(&recent("sol-1", Chain::Solana, 5)).unwrap();
        store.add_recent(&recent("0xsui", Chain::Sui, 1)).unwrap();

        let solana = store.get_recent_for_chain(Chain::Solana).unwrap();
        assert_eq!(solana.len(), 1);
        assert_eq!(solana[0].address, "sol-1");
    }

    #[test]
    fn re_adding_an_address_moves_it_to_the_front() {
        let (store, _dir) = temp_store();
        store.add_recent(&recent("a", Chain::Solana, 30)).unwrap();
        store.add_recent(&recent("b", Chain::Solana, 20)).unwrap();
        store.add_recent(&recent("a", Chain::Solana, 10)).unwrap();

        let rows = store.get_recent_for_chain(Chain::Solana).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn clear_removes_everything() {
        let (store, _dir) = temp_store();
        store.add_recent(&recent("a", Chain::Sui, 1)).unwrap();
        store.clear().unwrap();
        assert!(store.get_recent_for_chain(Chain::Sui).unwrap().is_empty());
    }
}
