// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallets, accounts, and per-chain secrets.
//!
//! A wallet is one recovery phrase. Each account is one derivation index
//! under it, identified by its primary-chain address, and owns exactly one
//! secret per supported chain. Creation derives every key first and then
//! writes all rows in a single redb transaction.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::database::{
    path_index_from_key, path_index_key, path_index_prefix, prefix_end, secret_by_account_key,
    StoreDb, ACCOUNTS, ACCOUNT_PATH_INDEX, PATH_INDEX_HIGH_WATER, SECRETS, SECRET_BY_ACCOUNT,
    WALLETS,
};
use super::events::{ChangeKind, Table};
use super::kv::{KvStore, CURRENT_ACCOUNT_ID_KEY};
use super::StoreError;
use crate::chains::{Chain, ChainKey, ChainRegistry};
use crate::crypto::mnemonic;
use crate::error::{WalletError, WalletResult};

// =============================================================================
// Rows
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
pub struct WalletRow {
    pub id: String,
    pub label: String,
    pub mnemonic: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for WalletRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRow")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("mnemonic", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Id and label, for wallet pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    /// Primary-chain address at `path_index`.
    pub id: String,
    pub wallet_id: String,
    pub path_index: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecretRow {
    pub address: String,
    pub secret_key: String,
    pub wallet_id: String,
    pub account_id: String,
    pub chain: Chain,
}

impl fmt::Debug for SecretRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRow")
            .field("address", &self.address)
            .field("secret_key", &"<redacted>")
            .field("wallet_id", &self.wallet_id)
            .field("account_id", &self.account_id)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Public half of a secret row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: String,
}

// =============================================================================
// AccountStore
// =============================================================================

#[derive(Clone)]
pub struct AccountStore {
    db: Arc<StoreDb>,
    kv: KvStore,
    chains: ChainRegistry,
}

impl AccountStore {
    pub fn new(db: Arc<StoreDb>, kv: KvStore, chains: ChainRegistry) -> Self {
        Self { db, kv, chains }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Import a phrase as a new wallet with its first account at index 0.
    ///
    /// The new account becomes current once the rows are committed.
    pub fn create_new_wallet(&self, phrase: &str) -> WalletResult<AccountRow> {
        mnemonic::parse(phrase)?;
        let phrase = Zeroizing::new(mnemonic::normalize(phrase));
        let keys = self.derive_keys(&phrase, 0)?;

        let wallet = WalletRow {
            id: mnemonic::wallet_id(&phrase),
            label: String::new(),
            mnemonic: phrase.to_string(),
            created_at: Utc::now(),
        };
        let account = self.insert_wallet(wallet, &keys)?;
        self.set_current_account_id(&account.id)?;

        tracing::info!(
            wallet_id = %account.wallet_id,
            account_id = %account.id,
            "Created wallet"
        );
        Ok(account)
    }

    /// Derive and store the account at `path_index` of an existing wallet.
    ///
    /// The account-count ceiling is the caller's business.
    pub fn create_next_account_at_path_index(
        &self,
        wallet_id: &str,
        path_index: u32,
    ) -> WalletResult<AccountRow> {
        let phrase = self.get_wallet_mnemonic(wallet_id)?;
        let keys = self.derive_keys(&phrase, path_index)?;

        let write_txn = self.db.begin_write()?;
        if write_txn.open_table(WALLETS)?.get(wallet_id)?.is_none() {
            return Err(WalletError::MnemonicNotFound(wallet_id.to_string()));
        }
        let account = write_account(&write_txn, wallet_id, path_index, &keys)?;
        write_txn.commit()?;

        self.emit_account_inserted();
        self.set_current_account_id(&account.id)?;

        tracing::info!(
            wallet_id,
            account_id = %account.id,
            path_index,
            "Created account"
        );
        Ok(account)
    }

    /// Insert the wallet row and its first account in one transaction.
    fn insert_wallet(&self, mut wallet: WalletRow, keys: &[ChainKey]) -> WalletResult<AccountRow> {
        let write_txn = self.db.begin_write()?;
        {
            let mut wallets = write_txn.open_table(WALLETS)?;
            if wallets.get(wallet.id.as_str())?.is_some() {
                return Err(WalletError::AlreadyExists(format!("wallet {}", wallet.id)));
            }
            wallet.label = format!("Wallet {}", wallets.len()? + 1);
            let json = serde_json::to_vec(&wallet)?;
            wallets.insert(wallet.id.as_str(), json.as_slice())?;
        }
        let account = write_account(&write_txn, &wallet.id, 0, keys)?;
        write_txn.commit()?;

        self.db.events().emit(Table::Wallet, ChangeKind::Insert);
        self.emit_account_inserted();
        Ok(account)
    }

    fn derive_keys(&self, phrase: &str, path_index: u32) -> WalletResult<Vec<ChainKey>> {
        self.chains
            .all()
            .iter()
            .map(|ops| ops.generate_key_from_mnemonic(phrase, path_index))
            .collect()
    }

    fn emit_account_inserted(&self) {
        self.db.events().emit(Table::Account, ChangeKind::Insert);
        self.db.events().emit(Table::Secret, ChangeKind::Insert);
    }

    // =========================================================================
    // Wallet reads
    // =========================================================================

    pub fn wallet_count(&self) -> WalletResult<usize> {
        let read_txn = self.db.begin_read()?;
        let len = read_txn.open_table(WALLETS)?.len()?;
        Ok(len as usize)
    }

    /// Every wallet, oldest first.
    pub fn all_wallets(&self) -> WalletResult<Vec<WalletSummary>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS)?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let row: WalletRow = serde_json::from_slice(value.value())?;
            rows.push(row);
        }
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.label.cmp(&b.label))
        });

        Ok(rows
            .into_iter()
            .map(|row| WalletSummary {
                id: row.id,
                label: row.label,
            })
            .collect())
    }

    pub fn get_wallet(&self, wallet_id: &str) -> WalletResult<Option<WalletRow>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        match table.get(wallet_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_wallet_mnemonic(&self, wallet_id: &str) -> WalletResult<Zeroizing<String>> {
        self.get_wallet(wallet_id)?
            .map(|row| Zeroizing::new(row.mnemonic))
            .ok_or_else(|| WalletError::MnemonicNotFound(wallet_id.to_string()))
    }

    pub fn get_wallet_id_for_account_id(&self, account_id: &str) -> WalletResult<Option<String>> {
        Ok(self.get_account_by_id(account_id)?.map(|a| a.wallet_id))
    }

    pub fn get_wallet_for_account_id(&self, account_id: &str) -> WalletResult<Option<WalletRow>> {
        match self.get_wallet_id_for_account_id(account_id)? {
            Some(wallet_id) => self.get_wallet(&wallet_id),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Account reads
    // =========================================================================

    pub fn get_account_by_id(&self, account_id: &str) -> WalletResult<Option<AccountRow>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(account_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Accounts of one wallet, by ascending path index.
    pub fn accounts_for_wallet(&self, wallet_id: &str) -> WalletResult<Vec<AccountRow>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ACCOUNT_PATH_INDEX)?;
        let accounts = read_txn.open_table(ACCOUNTS)?;

        let prefix = path_index_prefix(wallet_id);
        let end = prefix_end(&prefix);
        let mut rows = Vec::new();
        for entry in index.range(prefix.as_slice()..end.as_slice())? {
            let (_, account_id) = entry?;
            let value = accounts.get(account_id.value())?.ok_or_else(|| {
                StoreError::Corrupt(format!("dangling account {}", account_id.value()))
            })?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }

    pub fn count_accounts_for_wallet(&self, wallet_id: &str) -> WalletResult<usize> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ACCOUNT_PATH_INDEX)?;

        let prefix = path_index_prefix(wallet_id);
        let end = prefix_end(&prefix);
        let mut count = 0;
        for entry in index.range(prefix.as_slice()..end.as_slice())? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn has_accounts(&self) -> WalletResult<bool> {
        let read_txn = self.db.begin_read()?;
        Ok(!read_txn.open_table(ACCOUNTS)?.is_empty()?)
    }

    /// `max(path_index) + 1`, or 1 for a wallet without accounts.
    ///
    /// Never returns an index that was handed out before, even if that
    /// account has since been deleted.
    pub fn get_next_path_index(&self, wallet_id: &str) -> WalletResult<u32> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ACCOUNT_PATH_INDEX)?;
        let high_water = read_txn.open_table(PATH_INDEX_HIGH_WATER)?;

        let prefix = path_index_prefix(wallet_id);
        let end = prefix_end(&prefix);
        let max_live = match index.range(prefix.as_slice()..end.as_slice())?.next_back() {
            Some(entry) => {
                let (key, _) = entry?;
                Some(path_index_from_key(key.value()).ok_or_else(|| {
                    StoreError::Corrupt("short account_path_index key".to_string())
                })?)
            }
            None => None,
        };
        let max_ever = high_water.get(wallet_id)?.map(|v| v.value());

        match max_live.max(max_ever) {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                WalletError::AlreadyExists(format!("path index space of wallet {wallet_id}"))
            }),
            None => Ok(1),
        }
    }

    // =========================================================================
    // Secret reads
    // =========================================================================

    /// Signing key stored for `address`.
    pub fn get_chain_key_for_address(&self, address: &str) -> WalletResult<ChainKey> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        let value = table
            .get(address)?
            .ok_or_else(|| WalletError::KeyNotFound(address.to_string()))?;
        let row: SecretRow = serde_json::from_slice(value.value())?;
        Ok(ChainKey::new(row.chain, row.address, row.secret_key))
    }

    pub fn get_address_for_account_id_chain(
        &self,
        account_id: &str,
        chain: Chain,
    ) -> WalletResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRET_BY_ACCOUNT)?;
        let key = secret_by_account_key(account_id, chain);
        Ok(table.get(key.as_str())?.map(|v| v.value().to_string()))
    }

    /// Every address this device holds a key for on `chain`.
    pub fn get_my_addresses_for_chain(&self, chain: Chain) -> WalletResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;

        let mut addresses = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let row: SecretRow = serde_json::from_slice(value.value())?;
            if row.chain == chain {
                addresses.push(row.address);
            }
        }
        Ok(addresses)
    }

    /// Addresses of one account, in [`Chain::ALL`] order.
    pub fn get_keys_for_account(&self, account_id: &str) -> WalletResult<Vec<ChainAddress>> {
        let mut keys = Vec::with_capacity(Chain::ALL.len());
        for chain in Chain::ALL {
            if let Some(address) = self.get_address_for_account_id_chain(account_id, chain)? {
                keys.push(ChainAddress { chain, address });
            }
        }
        Ok(keys)
    }

    // =========================================================================
    // Active-account pointer
    // =========================================================================

    /// Id of the active account, if one was ever set.
    pub fn current_account_id(&self) -> WalletResult<Option<String>> {
        Ok(self
            .kv
            .get(CURRENT_ACCOUNT_ID_KEY)?
            .filter(|id| !id.is_empty()))
    }

    pub fn set_current_account_id(&self, account_id: &str) -> WalletResult<()> {
        self.kv.set(CURRENT_ACCOUNT_ID_KEY, account_id)?;
        tracing::debug!(account_id, "Active account changed");
        Ok(())
    }

    pub fn clear_current_account_id(&self) -> WalletResult<()> {
        Ok(self.kv.remove(CURRENT_ACCOUNT_ID_KEY)?)
    }

    /// The active account row, if the pointer is set and still resolves.
    pub fn current_account(&self) -> WalletResult<Option<AccountRow>> {
        match self.current_account_id()? {
            Some(id) => self.get_account_by_id(&id),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Remove one account and its secrets. Its path index is not reused.
    pub fn delete_account(&self, account_id: &str) -> WalletResult<()> {
        let write_txn = self.db.begin_write()?;
        delete_account_rows(&write_txn, account_id)?;
        write_txn.commit()?;

        self.db.events().emit(Table::Account, ChangeKind::Delete);
        self.db.events().emit(Table::Secret, ChangeKind::Delete);
        if self.current_account_id()?.as_deref() == Some(account_id) {
            self.clear_current_account_id()?;
        }

        tracing::info!(account_id, "Deleted account");
        Ok(())
    }

    /// Remove a wallet together with all of its accounts and secrets.
    pub fn delete_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        let account_ids: Vec<String> = self
            .accounts_for_wallet(wallet_id)?
            .into_iter()
            .map(|a| a.id)
            .collect();

        let write_txn = self.db.begin_write()?;
        for account_id in &account_ids {
            delete_account_rows(&write_txn, account_id)?;
        }
        {
            let mut wallets = write_txn.open_table(WALLETS)?;
            if wallets.remove(wallet_id)?.is_none() {
                return Err(WalletError::MnemonicNotFound(wallet_id.to_string()));
            }
            write_txn.open_table(PATH_INDEX_HIGH_WATER)?.remove(wallet_id)?;
        }
        write_txn.commit()?;

        for table in [Table::Wallet, Table::Account, Table::Secret] {
            self.db.events().emit(table, ChangeKind::Delete);
        }
        if let Some(current) = self.current_account_id()? {
            if account_ids.contains(&current) {
                self.clear_current_account_id()?;
            }
        }

        tracing::info!(wallet_id, accounts = account_ids.len(), "Deleted wallet");
        Ok(())
    }

    /// Wipe wallets, accounts, and secrets. The pointer is left alone.
    pub fn delete_everything(&self) -> WalletResult<()> {
        let write_txn = self.db.begin_write()?;
        write_txn.open_table(SECRETS)?.retain(|_, _| false)?;
        write_txn.open_table(SECRET_BY_ACCOUNT)?.retain(|_, _| false)?;
        write_txn.open_table(ACCOUNTS)?.retain(|_, _| false)?;
        write_txn.open_table(ACCOUNT_PATH_INDEX)?.retain(|_, _| false)?;
        write_txn.open_table(PATH_INDEX_HIGH_WATER)?.retain(|_, _| false)?;
        write_txn.open_table(WALLETS)?.retain(|_, _| false)?;
        write_txn.commit()?;

        for table in [Table::Secret, Table::Account, Table::Wallet] {
            self.db.events().emit(table, ChangeKind::Clear);
        }
        tracing::warn!("Deleted all wallets, accounts and secrets");
        Ok(())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Insert one account and a secret per key, checking every uniqueness rule.
///
/// Any error leaves the caller's transaction uncommitted.
fn write_account(
    txn: &WriteTransaction,
    wallet_id: &str,
    path_index: u32,
    keys: &[ChainKey],
) -> WalletResult<AccountRow> {
    let primary = keys
        .iter()
        .find(|k| k.chain == Chain::PRIMARY)
        .ok_or_else(|| WalletError::KeyNotFound(format!("{} key", Chain::PRIMARY)))?;
    let account = AccountRow {
        id: primary.address.clone(),
        wallet_id: wallet_id.to_string(),
        path_index,
    };

    {
        let mut accounts = txn.open_table(ACCOUNTS)?;
        if accounts.get(account.id.as_str())?.is_some() {
            return Err(WalletError::AlreadyExists(format!("account {}", account.id)));
        }
        let json = serde_json::to_vec(&account)?;
        accounts.insert(account.id.as_str(), json.as_slice())?;

        let mut index = txn.open_table(ACCOUNT_PATH_INDEX)?;
        let key = path_index_key(wallet_id, path_index);
        if index.get(key.as_slice())?.is_some() {
            return Err(WalletError::AlreadyExists(format!(
                "path index {path_index} of wallet {wallet_id}"
            )));
        }
        index.insert(key.as_slice(), account.id.as_str())?;

        let mut high_water = txn.open_table(PATH_INDEX_HIGH_WATER)?;
        let previous = high_water.get(wallet_id)?.map(|v| v.value());
        if previous.map_or(true, |p| path_index > p) {
            high_water.insert(wallet_id, path_index)?;
        }
    }

    let mut secrets = txn.open_table(SECRETS)?;
    let mut by_account = txn.open_table(SECRET_BY_ACCOUNT)?;
    for key in keys {
        if secrets.get(key.address.as_str())?.is_some() {
            return Err(WalletError::AlreadyExists(format!("secret for {}", key.address)));
        }
        let row = SecretRow {
            address: key.address.clone(),
            secret_key: key.secret_key.to_string(),
            wallet_id: wallet_id.to_string(),
            account_id: account.id.clone(),
            chain: key.chain,
        };
        let json = Zeroizing::new(serde_json::to_vec(&row)?);
        secrets.insert(row.address.as_str(), json.as_slice())?;
        by_account.insert(
            secret_by_account_key(&account.id, key.chain).as_str(),
            row.address.as_str(),
        )?;
    }

    Ok(account)
}

fn delete_account_rows(txn: &WriteTransaction, account_id: &str) -> WalletResult<()> {
    let account: AccountRow = {
        let mut accounts = txn.open_table(ACCOUNTS)?;
        let removed = accounts
            .remove(account_id)?
            .ok_or_else(|| WalletError::AccountNotFound(account_id.to_string()))?;
        serde_json::from_slice(removed.value())?
    };

    txn.open_table(ACCOUNT_PATH_INDEX)?
        .remove(path_index_key(&account.wallet_id, account.path_index).as_slice())?;

    let mut secrets = txn.open_table(SECRETS)?;
    let mut by_account = txn.open_table(SECRET_BY_ACCOUNT)?;
    for chain in Chain::ALL {
        let link = secret_by_account_key(account_id, chain);
        let address = by_account.remove(link.as_str())?.map(|v| v.value().to_string());
        if let Some(address) = address {
            secrets.remove(address.as_str())?;
        }
    }
    Ok(())
}
