// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sui adapter.
//!
//! - Keys: SLIP-0010 ed25519 at `m/44'/784'/{index}'/0'/0'`
//! - Transfers: the fullnode's `unsafe_paySui` / `unsafe_pay` builders do
//!   the merge-and-split; the engine picks coins, signs, and submits
//! - Fees: a dry run of the exact transaction, unless the caller passes a
//!   quote it already obtained
//! - Finality: bounded polling of `sui_getTransactionBlock`

pub mod coins;
pub mod keys;

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use serde_json::{json, Value};

use super::amount::{format_amount, parse_amount};
use super::rpc::{decode, JsonRpc, RpcError};
use super::types::{FeeEstimate, NetworkConfig, TokenInfo};
use super::{Chain, ChainKey};
use crate::config::ConfirmPolicy;
use crate::crypto::{mnemonic, slip10};
use crate::error::{Shortfall, WalletError, WalletResult};

pub const LOGO_URI: &str = "https://images.shogun.social/coin_sui_sui_3kecc";

pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";
pub const SUI_DECIMALS: u8 = 9;

/// Upper bound on the budget used only to build the transaction that gets
/// dry-run. The node checks it against the sender's real gas coins, so it is
/// capped at the SUI balance.
const PROVISIONAL_GAS_BUDGET: u64 = 50_000_000;

/// Smallest budget the node accepts for a transfer.
const MIN_GAS_BUDGET: u64 = 1_000_000;

pub fn native_token() -> TokenInfo {
    TokenInfo::new(SUI_COIN_TYPE, "SUI", "Sui", SUI_DECIMALS)
}

pub fn derivation_path(index: u32) -> String {
    format!("m/44'/784'/{index}'/0'/0'")
}

/// Signed transaction block ready for `sui_executeTransactionBlock`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx_bytes: String,
    pub signature: String,
    pub recipient: String,
    pub amount: u64,
    pub gas_budget: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Balance {
    total_balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBytes {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasCostSummary {
    computation_cost: String,
    storage_cost: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Effects {
    status: ExecutionStatus,
    gas_used: Option<GasCostSummary>,
}

#[derive(Deserialize)]
struct DryRunResponse {
    effects: Effects,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockResponse {
    digest: String,
    effects: Option<Effects>,
    timestamp_ms: Option<String>,
}

/// Which builder a transfer goes through.
enum Plan {
    /// Pay SUI from all SUI coins; gas comes out of the same coins.
    Native { coins: Vec<String>, amount: u64 },
    /// Pay a non-SUI coin from the selected coins; gas is picked by the node.
    Token { coins: Vec<String>, amount: u64 },
}

#[derive(Clone)]
pub struct SuiChain {
    rpc: Arc<dyn JsonRpc>,
    network: NetworkConfig,
    confirm: ConfirmPolicy,
}

impl SuiChain {
    pub fn new(rpc: Arc<dyn JsonRpc>, network: NetworkConfig, confirm: ConfirmPolicy) -> Self {
        Self {
            rpc,
            network,
            confirm,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn verify_address(&self, address: &str) -> bool {
        keys::is_valid_address(address)
    }

    pub fn generate_key_from_mnemonic(&self, phrase: &str, index: u32) -> WalletResult<ChainKey> {
        let seed = mnemonic::to_seed(phrase)?;
        let secret = slip10::derive(seed.as_slice(), &derivation_path(index))?;
        let signing = SigningKey::from_bytes(&secret);

        Ok(ChainKey::new(
            Chain::Sui,
            keys::address_of(&signing.verifying_key()),
            keys::encode_secret(&secret)?,
        ))
    }

    /// Returns `<pubkey_b58>:<sig_b58>`; the address alone cannot verify.
    pub fn sign_message(&self, key: &ChainKey, message: &str) -> WalletResult<String> {
        let signing = signing_key(key)?;
        let signature = signing.sign(message.as_bytes());
        Ok(format!(
            "{}:{}",
            bs58::encode(signing.verifying_key().as_bytes()).into_string(),
            bs58::encode(signature.to_bytes()).into_string()
        ))
    }

    pub async fn prepare_transfer(
        &self,
        from: &ChainKey,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
        fee_hint: Option<&FeeEstimate>,
    ) -> WalletResult<SignedTransaction> {
        let token = token.ok_or(WalletError::TokenNotFound)?;
        let recipient = keys::normalize_address(to)?;
        let signing = signing_key(from)?;
        let sender = from.address.clone();

        let requested = parse_amount(ui_amount, token.decimals)?;
        if requested == 0 {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            ));
        }

        let native = token.address == SUI_COIN_TYPE;
        let token_balance = self.get_balance(&sender, &token.address).await?;
        if requested > token_balance {
            return Err(WalletError::insufficient(Shortfall::Amount));
        }
        let sui_balance = if native {
            token_balance
        } else {
            self.get_balance(&sender, SUI_COIN_TYPE).await?
        };

        let hinted = match fee_hint {
            Some(hint) => parse_amount(&hint.fee, SUI_DECIMALS)?,
            None => 0,
        };
        let fee = if hinted > 0 {
            hinted
        } else {
            self.estimate_fee_raw(&sender, &recipient, requested, token, token_balance, sui_balance)
                .await?
        };
        if sui_balance < fee {
            return Err(WalletError::insufficient(Shortfall::Fee));
        }

        let plan = if native {
            let amount = if requested == token_balance {
                match requested.checked_sub(fee) {
                    Some(rest) if rest > 0 => rest,
                    _ => return Err(WalletError::insufficient(Shortfall::Fee)),
                }
            } else if requested.saturating_add(fee) > token_balance {
                return Err(WalletError::insufficient(Shortfall::Fee));
            } else {
                requested
            };
            Plan::Native {
                coins: self.coin_ids(&sender, SUI_COIN_TYPE).await?,
                amount,
            }
        } else {
            let all = coins::fetch_all(self.rpc.as_ref(), &sender, &token.address).await?;
            let selected = coins::select(&all, requested)?;
            Plan::Token {
                coins: selected.into_iter().map(|c| c.object_id).collect(),
                amount: requested,
            }
        };

        let amount = match &plan {
            Plan::Native { amount, .. } | Plan::Token { amount, .. } => *amount,
        };
        let tx_bytes = self.build(&sender, &recipient, &plan, fee).await?;
        let signature = keys::sign_transaction(&signing, &tx_bytes)?;

        tracing::info!(
            chain = %Chain::Sui,
            from = %sender,
            to = %recipient,
            token = %token.symbol,
            amount,
            gas_budget = fee,
            "Prepared transfer"
        );

        Ok(SignedTransaction {
            tx_bytes,
            signature,
            recipient,
            amount,
            gas_budget: fee,
        })
    }

    pub async fn broadcast(&self, tx: &SignedTransaction) -> WalletResult<String> {
        let result = self
            .rpc
            .call(
                "sui_executeTransactionBlock",
                json!([tx.tx_bytes, [tx.signature], { "showEffects": true }]),
            )
            .await
            .map_err(|e| match e {
                RpcError::Server { message, .. } => WalletError::TransactionRejected(message),
                other => other.into(),
            })?;
        let response: TransactionBlockResponse = decode("sui_executeTransactionBlock", result)?;

        if let Some(effects) = &response.effects {
            reject_on_failure(&effects.status)?;
        }
        tracing::info!(chain = %Chain::Sui, digest = %response.digest, "Broadcast transaction");
        Ok(response.digest)
    }

    /// Dry-run quote for the exact transfer, in SUI.
    pub async fn get_fee_estimate(
        &self,
        from: &str,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
    ) -> WalletResult<FeeEstimate> {
        let token = token.ok_or(WalletError::TokenNotFound)?;
        let sender = keys::normalize_address(from)?;
        let recipient = keys::normalize_address(to)?;
        let amount = parse_amount(ui_amount, token.decimals)?;
        let balance = self.get_balance(&sender, &token.address).await?;
        let sui_balance = if token.address == SUI_COIN_TYPE {
            balance
        } else {
            self.get_balance(&sender, SUI_COIN_TYPE).await?
        };

        let fee = self
            .estimate_fee_raw(&sender, &recipient, amount, token, balance, sui_balance)
            .await?;
        Ok(FeeEstimate {
            fee: format_amount(fee, SUI_DECIMALS),
            symbol: "SUI".to_string(),
        })
    }

    /// Poll until the transaction is checkpointed or the policy runs out.
    ///
    /// A JSON-RPC error means the node does not know the digest yet; a
    /// transport failure ends polling with an error.
    pub async fn confirm_transaction(&self, digest: &str) -> WalletResult<bool> {
        let attempts = self.confirm.attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .rpc
                .call(
                    "sui_getTransactionBlock",
                    json!([digest, { "showEffects": true }]),
                )
                .await
            {
                Ok(result) => {
                    let block: TransactionBlockResponse =
                        decode("sui_getTransactionBlock", result)?;
                    if let Some(effects) = &block.effects {
                        reject_on_failure(&effects.status)?;
                    }
                    if block.timestamp_ms.is_some() {
                        tracing::info!(chain = %Chain::Sui, digest, attempt, "Transaction confirmed");
                        return Ok(true);
                    }
                }
                Err(RpcError::Server { message, .. }) => {
                    tracing::debug!(chain = %Chain::Sui, digest, attempt, %message, "Transaction not visible yet");
                }
                Err(e) => return Err(e.into()),
            }

            if attempt < attempts {
                tokio::time::sleep(self.confirm.interval).await;
            }
        }

        tracing::warn!(chain = %Chain::Sui, digest, attempts, "Transaction not confirmed after polling");
        Ok(false)
    }

    /// Build the transfer with a provisional budget and dry-run it.
    ///
    /// Native sends are quoted on an amount that leaves room for the budget
    /// in the same coins; the cost does not depend on the amount.
    async fn estimate_fee_raw(
        &self,
        sender: &str,
        recipient: &str,
        amount: u64,
        token: &TokenInfo,
        token_balance: u64,
        sui_balance: u64,
    ) -> WalletResult<u64> {
        let native = token.address == SUI_COIN_TYPE;
        let budget = provisional_budget(sui_balance, native)?;

        let plan = if native {
            let quoted = amount.min(token_balance.saturating_sub(budget)).max(1);
            Plan::Native {
                coins: self.coin_ids(sender, SUI_COIN_TYPE).await?,
                amount: quoted,
            }
        } else {
            let all = coins::fetch_all(self.rpc.as_ref(), sender, &token.address).await?;
            let selected = coins::select(&all, amount)?;
            Plan::Token {
                coins: selected.into_iter().map(|c| c.object_id).collect(),
                amount,
            }
        };

        let tx_bytes = self.build(sender, recipient, &plan, budget).await?;
        let result = self
            .rpc
            .call("sui_dryRunTransactionBlock", json!([tx_bytes]))
            .await
            .map_err(|e| match e {
                RpcError::Server { message, .. } => WalletError::SimulationFailed(message),
                other => other.into(),
            })?;
        let dry_run: DryRunResponse = decode("sui_dryRunTransactionBlock", result)?;

        if dry_run.effects.status.status != "success" {
            return Err(WalletError::SimulationFailed(
                dry_run
                    .effects
                    .status
                    .error
                    .unwrap_or_else(|| dry_run.effects.status.status.clone()),
            ));
        }
        let gas = dry_run.effects.gas_used.ok_or_else(|| {
            WalletError::SimulationFailed("dry run returned no gas summary".to_string())
        })?;
        let fee = parse_u64("computationCost", &gas.computation_cost)?
            .saturating_add(parse_u64("storageCost", &gas.storage_cost)?);

        tracing::debug!(chain = %Chain::Sui, sender, fee, "Dry-run fee estimate");
        Ok(fee)
    }

    async fn build(
        &self,
        sender: &str,
        recipient: &str,
        plan: &Plan,
        gas_budget: u64,
    ) -> WalletResult<String> {
        let (method, params) = match plan {
            Plan::Native { coins, amount } => (
                "unsafe_paySui",
                json!([
                    sender,
                    coins,
                    [recipient],
                    [amount.to_string()],
                    gas_budget.to_string()
                ]),
            ),
            Plan::Token { coins, amount } => (
                "unsafe_pay",
                json!([
                    sender,
                    coins,
                    [recipient],
                    [amount.to_string()],
                    Value::Null,
                    gas_budget.to_string()
                ]),
            ),
        };
        let result = self.rpc.call(method, params).await.map_err(|e| match e {
            RpcError::Server { message, .. } => WalletError::SimulationFailed(message),
            other => other.into(),
        })?;
        let built: TransactionBytes = decode(method, result)?;
        Ok(built.tx_bytes)
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> WalletResult<u64> {
        let result = self
            .rpc
            .call("suix_getBalance", json!([owner, coin_type]))
            .await?;
        let balance: Balance = decode("suix_getBalance", result)?;
        parse_u64("totalBalance", &balance.total_balance)
    }

    async fn coin_ids(&self, owner: &str, coin_type: &str) -> WalletResult<Vec<String>> {
        let all = coins::fetch_all(self.rpc.as_ref(), owner, coin_type).await?;
        if all.is_empty() {
            return Err(WalletError::insufficient(Shortfall::Fee));
        }
        Ok(all.into_iter().map(|c| c.object_id).collect())
    }
}

/// Dry-run budget the sender's SUI can cover.
///
/// Native sends keep one MIST back for the quoted amount.
fn provisional_budget(sui_balance: u64, native: bool) -> WalletResult<u64> {
    let available = if native {
        sui_balance.saturating_sub(1)
    } else {
        sui_balance
    };
    if available < MIN_GAS_BUDGET {
        return Err(WalletError::insufficient(Shortfall::Fee));
    }
    Ok(available.min(PROVISIONAL_GAS_BUDGET))
}

fn reject_on_failure(status: &ExecutionStatus) -> WalletResult<()> {
    if status.status == "failure" {
        return Err(WalletError::TransactionRejected(
            status
                .error
                .clone()
                .unwrap_or_else(|| "execution failed".to_string()),
        ));
    }
    Ok(())
}

fn parse_u64(field: &str, raw: &str) -> WalletResult<u64> {
    raw.parse()
        .map_err(|_| RpcError::Decode(format!("{field} `{raw}` is not a u64")).into())
}

fn signing_key(key: &ChainKey) -> WalletResult<SigningKey> {
    let secret = keys::decode_secret(&key.secret_key)?;
    let signing = SigningKey::from_bytes(&secret);
    if keys::address_of(&signing.verifying_key()) != key.address {
        return Err(WalletError::InvalidSecretKey(format!(
            "secret does not belong to {}",
            key.address
        )));
    }
    Ok(signing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::types::SUI_MAINNET;
    use crate::chains::rpc::fake::FakeRpc;
    use crate::crypto::mnemonic::tests::{ABANDON_12, ZOO_24};
    use base64ct::{Base64, Encoding};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use std::time::{Duration, Instant};

    const USDC_TYPE: &str =
        "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC";

    fn fast_policy() -> ConfirmPolicy {
        ConfirmPolicy {
            attempts: 3,
            interval: Duration::from_millis(20),
        }
    }

    fn chain(rpc: &Arc<FakeRpc>) -> SuiChain {
        SuiChain::new(rpc.clone(), SUI_MAINNET, fast_policy())
    }

    fn usdc() -> TokenInfo {
        TokenInfo::new(USDC_TYPE, "USDC", "USD Coin", 6)
    }

    fn keys_pair() -> (ChainKey, ChainKey) {
        let rpc = FakeRpc::new();
        let c = chain(&rpc);
        (
            c.generate_key_from_mnemonic(ZOO_24, 0).unwrap(),
            c.generate_key_from_mnemonic(ZOO_24, 1).unwrap(),
        )
    }

    fn script_balances(rpc: &FakeRpc, sui: u64, usdc: u64) {
        rpc.on("suix_getBalance", move |params| {
            let total = if params[1] == SUI_COIN_TYPE { sui } else { usdc };
            Ok(json!({ "coinType": params[1], "coinObjectCount": 1, "totalBalance": total.to_string() }))
        });
    }

    fn script_coins(rpc: &FakeRpc) {
        rpc.on("suix_getCoins", |params| {
            let data = if params[1] == SUI_COIN_TYPE {
                json!([{ "coinObjectId": "0xs1", "balance": "1000000000" }])
            } else {
                json!([
                    { "coinObjectId": "0xu1", "balance": "400000" },
                    { "coinObjectId": "0xu2", "balance": "700000" },
                    { "coinObjectId": "0xu3", "balance": "9000000" }
                ])
            };
            Ok(json!({ "data": data, "nextCursor": null, "hasNextPage": false }))
        });
    }

    fn script_builders(rpc: &FakeRpc) {
        let bytes = Base64::encode_string(&[7u8; 40]);
        let native = bytes.clone();
        rpc.on("unsafe_paySui", move |_| Ok(json!({ "txBytes": native })));
        rpc.on("unsafe_pay", move |_| Ok(json!({ "txBytes": bytes })));
        rpc.respond(
            "sui_dryRunTransactionBlock",
            json!({ "effects": {
                "status": { "status": "success" },
                "gasUsed": { "computationCost": "750000", "storageCost": "1976000", "storageRebate": "978120" }
            } }),
        );
        rpc.respond(
            "sui_executeTransactionBlock",
            json!({ "digest": "D1g3st", "effects": { "status": { "status": "success" } } }),
        );
    }

    #[test]
    fn derivation_is_deterministic_and_decodable() {
        let rpc = FakeRpc::new();
        let c = chain(&rpc);
        let a = c.generate_key_from_mnemonic(ABANDON_12, 0).unwrap();
        let b = c.generate_key_from_mnemonic(ABANDON_12, 0).unwrap();
        let other = c.generate_key_from_mnemonic(ABANDON_12, 1).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.address, other.address);
        assert!(c.verify_address(&a.address));
        assert!(a.secret_key.starts_with("suiprivkey1"));
        assert!(signing_key(&a).is_ok());
    }

    #[test]
    fn derivation_matches_known_address_and_secret() {
        const FILM_24: &str = "film crazy soon outside stand loop subway crumble thrive popular \
             green nuclear struggle pistol arm wife phrase warfare march wheat nephew ask sunny firm";

        let rpc = FakeRpc::new();
        let key = chain(&rpc).generate_key_from_mnemonic(FILM_24, 0).unwrap();
        assert_eq!(
            key.address,
            "0xa2d14fad60c56049ecf75246a481934691214ce413e6a8ae2fe6834c173a6133"
        );
        assert_eq!(
            key.secret_key.as_str(),
            "suiprivkey1qrwsjvr6gwaxmsvxk4cfun99ra8uwxg3c9pl0nhle7xxpe4s80y05ctazer"
        );
    }

    #[test]
    fn message_signature_carries_public_key() {
        let rpc = FakeRpc::new();
        let (key, _) = keys_pair();
        let signed = chain(&rpc).sign_message(&key, "hello").unwrap();
        let (pk, sig) = signed.split_once(':').unwrap();

        let pk: [u8; 32] = bs58::decode(pk).into_vec().unwrap().try_into().unwrap();
        let sig: [u8; 64] = bs58::decode(sig).into_vec().unwrap().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&pk).unwrap();
        assert_eq!(keys::address_of(&verifying), key.address);
        verifying.verify(b"hello", &Signature::from_bytes(&sig)).unwrap();
    }

    #[tokio::test]
    async fn token_overdraft_never_broadcasts() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 1_000_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let c = chain(&rpc);
        let result = c
            .prepare_transfer(&from, &to.address, "5", Some(&usdc()), None)
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { shortfall: Shortfall::Amount })
        ));
        assert_eq!(rpc.calls_to("sui_executeTransactionBlock"), 0);
        assert_eq!(rpc.calls_to("unsafe_pay"), 0);
    }

    #[tokio::test]
    async fn token_transfer_selects_coins_and_uses_dry_run_fee() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();
        let c = chain(&rpc);

        let tx = c
            .prepare_transfer(&from, &to.address, "1", Some(&usdc()), None)
            .await
            .unwrap();
        assert_eq!(tx.amount, 1_000_000);
        assert_eq!(tx.gas_budget, 750_000 + 1_976_000);
        assert_eq!(rpc.calls_to("sui_dryRunTransactionBlock"), 1);

        let builds = rpc.params_of("unsafe_pay");
        let last = builds.last().unwrap();
        assert_eq!(last[1], json!(["0xu1", "0xu2"]));
        assert_eq!(last[3], json!(["1000000"]));
        assert_eq!(last[5], json!((750_000u64 + 1_976_000).to_string()));

        let digest = c.broadcast(&tx).await.unwrap();
        assert_eq!(digest, "D1g3st");
        let sent = rpc.params_of("sui_executeTransactionBlock");
        assert_eq!(sent[0][1], json!([tx.signature]));
    }

    #[tokio::test]
    async fn fee_hint_skips_dry_run() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();
        let hint = FeeEstimate { fee: "0.003".into(), symbol: "SUI".into() };

        let tx = chain(&rpc)
            .prepare_transfer(&from, &to.address, "1", Some(&usdc()), Some(&hint))
            .await
            .unwrap();
        assert_eq!(tx.gas_budget, 3_000_000);
        assert_eq!(rpc.calls_to("sui_dryRunTransactionBlock"), 0);
    }

    #[tokio::test]
    async fn zero_fee_hint_falls_back_to_dry_run() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();
        let hint = FeeEstimate { fee: "0".into(), symbol: "SUI".into() };

        let tx = chain(&rpc)
            .prepare_transfer(&from, &to.address, "1", Some(&usdc()), Some(&hint))
            .await
            .unwrap();
        assert_eq!(tx.gas_budget, 2_726_000);
        assert_eq!(rpc.calls_to("sui_dryRunTransactionBlock"), 1);
    }

    #[tokio::test]
    async fn full_balance_native_send_deducts_fee() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 0);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();
        let hint = FeeEstimate { fee: "0.002".into(), symbol: "SUI".into() };

        let tx = chain(&rpc)
            .prepare_transfer(&from, &to.address, "1", Some(&native_token()), Some(&hint))
            .await
            .unwrap();
        assert_eq!(tx.amount, 1_000_000_000 - 2_000_000);

        let build = &rpc.params_of("unsafe_paySui")[0];
        assert_eq!(build[1], json!(["0xs1"]));
        assert_eq!(build[3], json!([(1_000_000_000u64 - 2_000_000).to_string()]));
    }

    #[tokio::test]
    async fn native_amount_plus_fee_over_balance_is_fee_shortfall() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 0);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();
        let hint = FeeEstimate { fee: "0.002".into(), symbol: "SUI".into() };

        let result = chain(&rpc)
            .prepare_transfer(&from, &to.address, "0.999", Some(&native_token()), Some(&hint))
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { shortfall: Shortfall::Fee })
        ));
    }

    #[tokio::test]
    async fn token_send_without_sui_for_gas_is_fee_shortfall() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let result = chain(&rpc)
            .prepare_transfer(&from, &to.address, "1", Some(&usdc()), None)
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { shortfall: Shortfall::Fee })
        ));
    }

    #[tokio::test]
    async fn fee_estimate_reads_dry_run_cost() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let fee = chain(&rpc)
            .get_fee_estimate(&from.address, &to.address, "1", Some(&native_token()))
            .await
            .unwrap();
        assert_eq!(fee, FeeEstimate { fee: "0.002726".into(), symbol: "SUI".into() });
        assert_eq!(rpc.calls_to("unsafe_paySui"), 1);
    }

    #[tokio::test]
    async fn small_balance_quote_caps_budget_at_balance() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 10_000_000, 0);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let fee = chain(&rpc)
            .get_fee_estimate(&from.address, &to.address, "0.001", Some(&native_token()))
            .await
            .unwrap();
        assert_eq!(fee.fee, "0.002726");

        let build = &rpc.params_of("unsafe_paySui")[0];
        assert_eq!(build[1], json!(["0xs1"]));
        let budget: u64 = build[4].as_str().unwrap().parse().unwrap();
        let quoted: u64 = build[3][0].as_str().unwrap().parse().unwrap();
        assert!(budget + quoted <= 10_000_000);
        assert!(budget >= MIN_GAS_BUDGET);
    }

    #[tokio::test]
    async fn small_balance_token_send_uses_balance_as_budget() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 5_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let tx = chain(&rpc)
            .prepare_transfer(&from, &to.address, "1", Some(&usdc()), None)
            .await
            .unwrap();
        assert_eq!(tx.gas_budget, 2_726_000);

        let dry_run_build = &rpc.params_of("unsafe_pay")[0];
        assert_eq!(dry_run_build[5], json!("5000000"));
    }

    #[tokio::test]
    async fn balance_below_minimum_budget_is_fee_shortfall() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, MIN_GAS_BUDGET / 2, 0);
        script_coins(&rpc);
        script_builders(&rpc);
        let (from, to) = keys_pair();

        let result = chain(&rpc)
            .get_fee_estimate(&from.address, &to.address, "0.0001", Some(&native_token()))
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { shortfall: Shortfall::Fee })
        ));
        assert_eq!(rpc.calls_to("unsafe_paySui"), 0);
    }

    #[tokio::test]
    async fn failed_dry_run_is_simulation_failure() {
        let rpc = FakeRpc::new();
        script_balances(&rpc, 1_000_000_000, 10_100_000);
        script_coins(&rpc);
        script_builders(&rpc);
        rpc.respond(
            "sui_dryRunTransactionBlock",
            json!({ "effects": { "status": { "status": "failure", "error": "InsufficientGas" } } }),
        );
        let (from, to) = keys_pair();

        let result = chain(&rpc)
            .get_fee_estimate(&from.address, &to.address, "1", Some(&usdc()))
            .await;
        assert!(matches!(result, Err(WalletError::SimulationFailed(msg)) if msg == "InsufficientGas"));
    }

    #[tokio::test]
    async fn estimate_requires_token() {
        let rpc = FakeRpc::new();
        let (from, to) = keys_pair();
        assert!(matches!(
            chain(&rpc)
                .get_fee_estimate(&from.address, &to.address, "1", None)
                .await,
            Err(WalletError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn confirmation_returns_true_once_checkpointed() {
        let rpc = FakeRpc::new();
        let polls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = polls.clone();
        rpc.on("sui_getTransactionBlock", move |_| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Err(RpcError::Server { code: -32000, message: "Could not find the referenced transaction".into() })
            } else {
                Ok(json!({ "digest": "D", "effects": { "status": { "status": "success" } }, "timestampMs": "1700000000000" }))
            }
        });

        assert!(chain(&rpc).confirm_transaction("D").await.unwrap());
        assert_eq!(rpc.calls_to("sui_getTransactionBlock"), 2);
    }

    #[tokio::test]
    async fn confirmation_gives_up_with_false_within_bound() {
        let rpc = FakeRpc::new();
        rpc.respond("sui_getTransactionBlock", json!({ "digest": "D", "timestampMs": null }));
        let policy = fast_policy();

        let started = Instant::now();
        let confirmed = chain(&rpc).confirm_transaction("D").await.unwrap();
        assert!(!confirmed);
        assert!(started.elapsed() <= policy.max_wait() + Duration::from_millis(500));
        assert_eq!(rpc.calls_to("sui_getTransactionBlock"), policy.attempts as usize);
    }

    #[tokio::test]
    async fn confirmation_distinguishes_rejection_and_network_failure() {
        let rpc = FakeRpc::new();
        rpc.respond(
            "sui_getTransactionBlock",
            json!({ "digest": "D", "effects": { "status": { "status": "failure", "error": "MoveAbort" } }, "timestampMs": "1" }),
        );
        assert!(matches!(
            chain(&rpc).confirm_transaction("D").await,
            Err(WalletError::TransactionRejected(_))
        ));

        let rpc = FakeRpc::new();
        rpc.fail("sui_getTransactionBlock", RpcError::Transport("connection refused".into()));
        assert!(matches!(
            chain(&rpc).confirm_transaction("D").await,
            Err(WalletError::Network(_))
        ));
    }
}
