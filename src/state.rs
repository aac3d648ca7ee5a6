// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Engine composition root.
//!
//! [`WalletEngine`] owns one instance of every service and hands out
//! clones. Nothing in the crate keeps a module-level singleton; tests build
//! an engine over a temp directory and a scripted transport.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::auth::{self, LinkAccount, LoginParams, SignedLinkRequest};
use crate::chains::{Chain, ChainKey, ChainRegistry, FeeEstimate, TokenInfo};
use crate::config::{EngineConfig, MAX_ACCOUNTS_PER_WALLET};
use crate::crypto::{mnemonic, passphrase};
use crate::error::{WalletError, WalletResult};
use crate::storage::{
    AccountRow, AccountStore, ChainAddress, KvStore, RecentRecipient, RecentStore, StoragePaths,
    StoreDb, TableChange, WalletSummary,
};
use crate::transfer::{PendingTransfer, SendGuard, TransferRequest, TransferService};

#[derive(Clone)]
pub struct WalletEngine {
    config: Arc<EngineConfig>,
    db: Arc<StoreDb>,
    chains: ChainRegistry,
    accounts: AccountStore,
    recents: RecentStore,
    transfers: TransferService,
}

impl WalletEngine {
    /// Open the data directory and build HTTP adapters from `config`.
    pub fn open(config: EngineConfig) -> WalletResult<Self> {
        let chains = ChainRegistry::new(&config)?;
        Self::with_chains(config, chains)
    }

    /// Open the data directory with a caller-supplied chain registry.
    pub fn with_chains(config: EngineConfig, chains: ChainRegistry) -> WalletResult<Self> {
        let paths = StoragePaths::new(&config.data_dir);
        let db = Arc::new(StoreDb::open(&paths.db_file())?);
        let kv = KvStore::open(paths.kv_dir())?;

        let accounts = AccountStore::new(db.clone(), kv, chains.clone());
        let recents = RecentStore::new(db.clone());
        let transfers = TransferService::new(accounts.clone(), recents.clone(), chains.clone());

        tracing::info!(data_dir = %paths.root().display(), "Wallet engine opened");
        Ok(Self {
            config: Arc::new(config),
            db,
            chains,
            accounts,
            recents,
            transfers,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn recents(&self) -> &RecentStore {
        &self.recents
    }

    /// Committed-write notifications for every table.
    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.db.events().subscribe()
    }

    // =========================================================================
    // Wallets and accounts
    // =========================================================================

    /// A fresh 24-word recovery phrase. Nothing is stored.
    pub fn generate_mnemonic(&self) -> WalletResult<Zeroizing<String>> {
        mnemonic::generate().map(Zeroizing::new)
    }

    /// Store `phrase` as a new wallet and make its first account current.
    pub fn import_wallet(&self, phrase: &str) -> WalletResult<AccountRow> {
        self.accounts.create_new_wallet(phrase)
    }

    pub fn wallets(&self) -> WalletResult<Vec<WalletSummary>> {
        self.accounts.all_wallets()
    }

    /// Derive the next account of `wallet_id` and make it current.
    pub fn add_account(&self, wallet_id: &str) -> WalletResult<AccountRow> {
        let count = self.accounts.count_accounts_for_wallet(wallet_id)?;
        if count >= MAX_ACCOUNTS_PER_WALLET {
            return Err(WalletError::AccountLimitReached(MAX_ACCOUNTS_PER_WALLET));
        }
        let path_index = self.accounts.get_next_path_index(wallet_id)?;
        self.accounts
            .create_next_account_at_path_index(wallet_id, path_index)
    }

    pub fn switch_account(&self, account_id: &str) -> WalletResult<AccountRow> {
        let account = self
            .accounts
            .get_account_by_id(account_id)?
            .ok_or_else(|| WalletError::AccountNotFound(account_id.to_string()))?;
        self.accounts.set_current_account_id(&account.id)?;
        tracing::info!(account_id, "Switched account");
        Ok(account)
    }

    /// The active account; `AccountNotFound` if none is set.
    pub fn current_account(&self) -> WalletResult<AccountRow> {
        self.accounts
            .current_account()?
            .ok_or_else(|| WalletError::AccountNotFound("no active account".to_string()))
    }

    /// Addresses of the active account, one per chain.
    pub fn current_addresses(&self) -> WalletResult<Vec<ChainAddress>> {
        let account = self.current_account()?;
        self.accounts.get_keys_for_account(&account.id)
    }

    /// Signing key of the active account on `chain`.
    pub fn current_key(&self, chain: Chain) -> WalletResult<ChainKey> {
        let account = self.current_account()?;
        let address = self
            .accounts
            .get_address_for_account_id_chain(&account.id, chain)?
            .ok_or_else(|| WalletError::KeyNotFound(format!("{chain} key of {}", account.id)))?;
        self.accounts.get_chain_key_for_address(&address)
    }

    /// Wipe every wallet, the active pointer, and the recent list.
    pub fn reset(&self) -> WalletResult<()> {
        self.accounts.delete_everything()?;
        self.accounts.clear_current_account_id()?;
        self.recents.clear()?;
        tracing::warn!("Wallet engine reset");
        Ok(())
    }

    // =========================================================================
    // Backup
    // =========================================================================

    /// Recovery phrase of `wallet_id`, encrypted under `password`.
    pub fn export_backup(&self, wallet_id: &str, password: &str) -> WalletResult<String> {
        let phrase = self.accounts.get_wallet_mnemonic(wallet_id)?;
        let blob = passphrase::encrypt_text(&phrase, password)?;
        tracing::info!(wallet_id, "Exported encrypted backup");
        Ok(blob)
    }

    pub fn decrypt_backup(&self, blob: &str, password: &str) -> WalletResult<Zeroizing<String>> {
        passphrase::decrypt_text(blob, password).map(Zeroizing::new)
    }

    // =========================================================================
    // Backend payloads
    // =========================================================================

    /// Login payload signed by the active account's primary key.
    pub fn login_params(&self) -> WalletResult<LoginParams> {
        let key = self.current_key(Chain::PRIMARY)?;
        auth::login_params(&self.chains, &key, Utc::now())
    }

    /// Link proofs for the active account's addresses missing from `linked`.
    pub fn link_proofs(&self, linked: &[ChainAddress]) -> WalletResult<Vec<LinkAccount>> {
        let primary = self.current_key(Chain::PRIMARY)?;
        let missing = auth::missing_links(&self.current_addresses()?, linked);

        let keys = missing
            .iter()
            .filter(|entry| entry.chain != Chain::PRIMARY)
            .map(|entry| self.accounts.get_chain_key_for_address(&entry.address))
            .collect::<WalletResult<Vec<_>>>()?;
        auth::link_proofs(&self.chains, &primary, &keys)
    }

    /// Signed `/auth/link` request carrying the proofs from [`link_proofs`](Self::link_proofs).
    pub fn link_request(&self, linked: &[ChainAddress]) -> WalletResult<SignedLinkRequest> {
        let primary = self.current_key(Chain::PRIMARY)?;
        let accounts = self.link_proofs(linked)?;
        auth::link_request(&self.chains, &primary, &accounts, Utc::now())
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    pub async fn estimate_fee(
        &self,
        from_address: &str,
        to_address: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
    ) -> WalletResult<FeeEstimate> {
        self.transfers
            .estimate_fee(from_address, to_address, ui_amount, token)
            .await
    }

    pub async fn send(
        &self,
        guard: &SendGuard,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> WalletResult<PendingTransfer> {
        self.transfers.send(guard, request, cancel).await
    }

    pub fn recent_recipients(&self, chain: Chain) -> WalletResult<Vec<RecentRecipient>> {
        self.recents.get_recent_for_chain(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::rpc::fake::FakeRpc;
    use crate::crypto::mnemonic::tests::{ABANDON_12, ZOO_24};
    use crate::storage::{ChangeKind, Table};

    fn engine() -> (WalletEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let engine =
            WalletEngine::with_chains(config, ChainRegistry::scripted(FakeRpc::new())).unwrap();
        (engine, dir)
    }

    #[test]
    fn import_sets_current_account() {
        let (engine, _dir) = engine();
        let account = engine.import_wallet(ABANDON_12).unwrap();

        assert_eq!(engine.current_account().unwrap(), account);
        let addresses = engine.current_addresses().unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].address, account.id);
    }

    #[test]
    fn add_account_uses_next_index_and_respects_ceiling() {
        let (engine, _dir) = engine();
        let first = engine.import_wallet(ZOO_24).unwrap();

        let second = engine.add_account(&first.wallet_id).unwrap();
        assert_eq!(second.path_index, 1);
        assert_eq!(engine.current_account().unwrap(), second);

        for _ in 2..MAX_ACCOUNTS_PER_WALLET {
            engine.add_account(&first.wallet_id).unwrap();
        }
        assert!(matches!(
            engine.add_account(&first.wallet_id),
            Err(WalletError::AccountLimitReached(MAX_ACCOUNTS_PER_WALLET))
        ));
    }

    #[test]
    fn switch_account_requires_a_known_id() {
        let (engine, _dir) = engine();
        let first = engine.import_wallet(ZOO_24).unwrap();
        engine.add_account(&first.wallet_id).unwrap();

        engine.switch_account(&first.id).unwrap();
        assert_eq!(engine.current_account().unwrap(), first);
        assert!(matches!(
            engine.switch_account("nope"),
            Err(WalletError::AccountNotFound(_))
        ));
    }

    #[test]
    fn backup_round_trips_and_rejects_wrong_password() {
        let (engine, _dir) = engine();
        let account = engine.import_wallet(ABANDON_12).unwrap();

        let blob = engine.export_backup(&account.wallet_id, "hunter2").unwrap();
        assert_eq!(blob.split(':').count(), 4);
        assert_eq!(engine.decrypt_backup(&blob, "hunter2").unwrap().as_str(), ABANDON_12);
        assert!(matches!(
            engine.decrypt_backup(&blob, "hunter3"),
            Err(WalletError::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let (engine, _dir) = engine();
        engine.import_wallet(ZOO_24).unwrap();
        let mut changes = engine.subscribe();

        engine.reset().unwrap();
        assert!(engine.wallets().unwrap().is_empty());
        assert!(matches!(engine.current_account(), Err(WalletError::AccountNotFound(_))));
        assert!(engine.recent_recipients(Chain::Sui).unwrap().is_empty());

        let first = changes.try_recv().unwrap();
        assert_eq!(first.kind, ChangeKind::Clear);
        assert_eq!(first.table, Table::Secret);
    }

    #[test]
    fn login_and_link_payloads_use_the_active_account() {
        let (engine, _dir) = engine();
        let account = engine.import_wallet(ZOO_24).unwrap();

        let login = engine.login_params().unwrap();
        assert_eq!(login.address, account.id);

        let links = engine.link_proofs(&[]).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].chain, Chain::Sui);

        let request = engine.link_request(&[]).unwrap();
        assert_eq!(request.path, auth::LINK_PATH);
        assert!(request.body.contains(&links[0].proof_signature));

        let sui = engine.current_key(Chain::Sui).unwrap();
        let known = [ChainAddress { chain: Chain::Sui, address: sui.address.clone() }];
        assert!(engine.link_proofs(&known).unwrap().is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let account = {
            let engine = WalletEngine::with_chains(
                config.clone(),
                ChainRegistry::scripted(FakeRpc::new()),
            )
            .unwrap();
            engine.import_wallet(ABANDON_12).unwrap()
        };

        let engine =
            WalletEngine::with_chains(config, ChainRegistry::scripted(FakeRpc::new())).unwrap();
        assert_eq!(engine.current_account().unwrap(), account);
        assert_eq!(engine.wallets().unwrap().len(), 1);
    }
}
