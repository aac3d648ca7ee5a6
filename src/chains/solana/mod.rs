// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana adapter.
//!
//! - Keys: SLIP-0010 ed25519 at `m/44'/501'/{index}'/0'`; the secret is the
//!   base58 64-byte keypair, the address the base58 public key
//! - Transfers: legacy transactions compiled locally, with a compute budget
//!   of 1,000,000 units at 50,000 micro-lamports per unit
//! - Finality: a single `getSignatureStatuses` query

pub mod tx;

use std::sync::Arc;

use base64ct::{Base64, Encoding};
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use self::tx::{find_program_address, sign_single, AccountMeta, Instruction, Message, Pubkey};
use super::amount::{format_amount, parse_amount};
use super::rpc::{decode, JsonRpc, RpcError, INVALID_PARAMS};
use super::types::{FeeEstimate, NetworkConfig, TokenInfo};
use super::{Chain, ChainKey};
use crate::crypto::{mnemonic, slip10};
use crate::error::{Shortfall, WalletError, WalletResult};

pub const LOGO_URI: &str = "https://images.shogun.social/coin_sol_solana_3torr";

/// The native asset is addressed by the system program id.
pub const NATIVE_TOKEN_ADDRESS: &str = "11111111111111111111111111111111";
pub const SOL_DECIMALS: u8 = 9;

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const COMPUTE_BUDGET_PROGRAM_ID: &str = "ComputeBudget111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

pub const COMPUTE_UNIT_LIMIT: u32 = 1_000_000;
pub const COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 50_000;
pub const BASE_FEE_LAMPORTS: u64 = 5_000;

/// Priority fee at the configured limit and price, in lamports.
pub const PRIORITY_FEE_LAMPORTS: u64 =
    COMPUTE_UNIT_LIMIT as u64 * COMPUTE_UNIT_PRICE_MICRO_LAMPORTS / 1_000_000;

/// Signature fee plus priority fee charged for every transfer.
pub const NATIVE_FEE_LAMPORTS: u64 = BASE_FEE_LAMPORTS + PRIORITY_FEE_LAMPORTS;

/// Size of an SPL token account, for the rent-exemption query.
const TOKEN_ACCOUNT_LEN: u64 = 165;

pub fn native_token() -> TokenInfo {
    TokenInfo::new(NATIVE_TOKEN_ADDRESS, "SOL", "Solana", SOL_DECIMALS)
}

pub fn derivation_path(index: u32) -> String {
    format!("m/44'/501'/{index}'/0'")
}

/// Signed legacy transaction, base64 on the wire.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// Base58 fee-payer signature; doubles as the transaction id.
    pub signature: String,
    pub wire: String,
    pub recipient: String,
    pub amount: u64,
    /// Whether a `CreateAssociatedTokenAccount` was prepended.
    pub creates_token_account: bool,
}

#[derive(Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    amount: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

#[derive(Clone)]
pub struct SolanaChain {
    rpc: Arc<dyn JsonRpc>,
    network: NetworkConfig,
}

impl SolanaChain {
    pub fn new(rpc: Arc<dyn JsonRpc>, network: NetworkConfig) -> Self {
        Self { rpc, network }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn verify_address(&self, address: &str) -> bool {
        address.parse::<Pubkey>().is_ok()
    }

    pub fn generate_key_from_mnemonic(&self, phrase: &str, index: u32) -> WalletResult<ChainKey> {
        let seed = mnemonic::to_seed(phrase)?;
        let secret = slip10::derive(seed.as_slice(), &derivation_path(index))?;
        let signing = SigningKey::from_bytes(&secret);

        let keypair = Zeroizing::new(signing.to_keypair_bytes());
        Ok(ChainKey::new(
            Chain::Solana,
            bs58::encode(signing.verifying_key().as_bytes()).into_string(),
            bs58::encode(keypair.as_slice()).into_string(),
        ))
    }

    pub fn sign_message(&self, key: &ChainKey, message: &str) -> WalletResult<String> {
        let signing = signing_key(key)?;
        let signature = signing.sign(message.as_bytes());
        Ok(bs58::encode(signature.to_bytes()).into_string())
    }

    pub async fn prepare_transfer(
        &self,
        from: &ChainKey,
        to: &str,
        ui_amount: &str,
        token: Option<&TokenInfo>,
    ) -> WalletResult<SignedTransaction> {
        let token = token.ok_or(WalletError::TokenNotFound)?;
        let recipient: Pubkey = to.parse()?;
        let signing = signing_key(from)?;
        let payer = Pubkey::new(signing.verifying_key().to_bytes());
        let mint: Pubkey = token.address.parse()?;

        let mut instructions = vec![
            set_compute_unit_limit(COMPUTE_UNIT_LIMIT)?,
            set_compute_unit_price(COMPUTE_UNIT_PRICE_MICRO_LAMPORTS)?,
        ];

        let (amount, creates_token_account) = if token.address == NATIVE_TOKEN_ADDRESS {
            let requested = positive(parse_amount(ui_amount, SOL_DECIMALS)?)?;
            let balance = self.get_balance(&payer).await?;
            let lamports = native_send_amount(requested, balance, NATIVE_FEE_LAMPORTS)?;
            instructions.push(system_transfer(&payer, &recipient, lamports)?);
            (lamports, false)
        } else {
            let amount = positive(parse_amount(ui_amount, token.decimals)?)?;
            let source = associated_token_address(&payer, &mint)?;
            let destination = associated_token_address(&recipient, &mint)?;

            let held = self.get_token_account_balance(&source).await?;
            if amount > held {
                tracing::info!(
                    chain = %Chain::Solana,
                    mint = %mint,
                    requested = amount,
                    held,
                    "Token balance too low for transfer"
                );
                return Err(WalletError::insufficient(Shortfall::Amount));
            }

            let create = !self.account_exists(&destination).await?;
            let rent = if create {
                self.rent_exempt_minimum(TOKEN_ACCOUNT_LEN).await?
            } else {
                0
            };
            let lamports = self.get_balance(&payer).await?;
            if NATIVE_FEE_LAMPORTS.saturating_add(rent) > lamports {
                return Err(WalletError::insufficient(Shortfall::Fee));
            }

            if create {
                instructions.push(create_associated_token_account(
                    &payer,
                    &destination,
                    &recipient,
                    &mint,
                )?);
            }
            instructions.push(transfer_checked(
                &source,
                &mint,
                &destination,
                &payer,
                amount,
                token.decimals,
            )?);
            (amount, create)
        };

        let blockhash = self.latest_blockhash().await?;
        let message = Message::compile(&payer, &instructions, blockhash)?;
        let (signature, wire) = sign_single(&message, &signing)?;

        let signed = SignedTransaction {
            signature: bs58::encode(signature).into_string(),
            wire: Base64::encode_string(&wire),
            recipient: recipient.to_string(),
            amount,
            creates_token_account,
        };
        tracing::info!(
            chain = %Chain::Solana,
            from = %payer,
            to = %recipient,
            token = %token.symbol,
            amount,
            creates_token_account,
            "Prepared transfer"
        );
        Ok(signed)
    }

    pub async fn broadcast(&self, tx: &SignedTransaction) -> WalletResult<String> {
        let result = self
            .rpc
            .call(
                "sendTransaction",
                json!([tx.wire, { "encoding": "base64", "preflightCommitment": "confirmed" }]),
            )
            .await
            .map_err(|e| match e {
                RpcError::Server { message, .. } => WalletError::TransactionRejected(message),
                other => other.into(),
            })?;
        let signature: String = decode("sendTransaction", result)?;
        tracing::info!(chain = %Chain::Solana, %signature, "Broadcast transaction");
        Ok(signature)
    }

    /// Fixed fee quote derived from the compute budget constants.
    pub fn get_fee_estimate(&self, token: Option<&TokenInfo>) -> WalletResult<FeeEstimate> {
        token.ok_or(WalletError::TokenNotFound)?;
        Ok(FeeEstimate {
            fee: format_amount(NATIVE_FEE_LAMPORTS, SOL_DECIMALS),
            symbol: "SOL".to_string(),
        })
    }

    pub async fn confirm_transaction(&self, signature: &str) -> WalletResult<bool> {
        let result = self
            .rpc
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        let statuses: ContextValue<Vec<Option<SignatureStatus>>> =
            decode("getSignatureStatuses", result)?;

        let Some(Some(status)) = statuses.value.into_iter().next() else {
            tracing::debug!(chain = %Chain::Solana, signature, "Signature not found yet");
            return Ok(false);
        };
        if let Some(err) = status.err.filter(|e| !e.is_null()) {
            return Err(WalletError::TransactionRejected(err.to_string()));
        }
        Ok(matches!(
            status.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        ))
    }

    async fn get_balance(&self, owner: &Pubkey) -> WalletResult<u64> {
        let result = self
            .rpc
            .call("getBalance", json!([owner.to_string(), { "commitment": "confirmed" }]))
            .await?;
        let balance: ContextValue<u64> = decode("getBalance", result)?;
        Ok(balance.value)
    }

    /// The node reports a missing token account as invalid params; that
    /// account holds nothing. Any other error is passed on.
    async fn get_token_account_balance(&self, account: &Pubkey) -> WalletResult<u64> {
        match self
            .rpc
            .call(
                "getTokenAccountBalance",
                json!([account.to_string(), { "commitment": "confirmed" }]),
            )
            .await
        {
            Ok(result) => {
                let balance: ContextValue<TokenAmount> = decode("getTokenAccountBalance", result)?;
                balance.value.amount.parse().map_err(|_| {
                    RpcError::Decode(format!("token amount `{}`", balance.value.amount)).into()
                })
            }
            Err(e) if e.code() == Some(INVALID_PARAMS) => {
                tracing::debug!(chain = %Chain::Solana, %account, "Token account not found");
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn account_exists(&self, account: &Pubkey) -> WalletResult<bool> {
        let result = self
            .rpc
            .call(
                "getAccountInfo",
                json!([account.to_string(), { "encoding": "base64", "commitment": "confirmed" }]),
            )
            .await?;
        let info: ContextValue<Option<Value>> = decode("getAccountInfo", result)?;
        Ok(info.value.is_some_and(|v| !v.is_null()))
    }

    async fn rent_exempt_minimum(&self, len: u64) -> WalletResult<u64> {
        let result = self
            .rpc
            .call("getMinimumBalanceForRentExemption", json!([len]))
            .await?;
        Ok(decode("getMinimumBalanceForRentExemption", result)?)
    }

    async fn latest_blockhash(&self) -> WalletResult<[u8; 32]> {
        let result = self
            .rpc
            .call("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
            .await?;
        let latest: ContextValue<LatestBlockhash> = decode("getLatestBlockhash", result)?;
        let hash: Pubkey = latest
            .value
            .blockhash
            .parse()
            .map_err(|_| RpcError::Decode("getLatestBlockhash: malformed blockhash".to_string()))?;
        Ok(hash.to_bytes())
    }
}

/// Lamports to send for a native transfer.
///
/// Sending the exact balance deducts the fee from the amount instead of
/// failing.
fn native_send_amount(requested: u64, balance: u64, fee: u64) -> WalletResult<u64> {
    if requested > balance {
        return Err(WalletError::insufficient(Shortfall::Amount));
    }
    if requested == balance {
        return match balance.checked_sub(fee) {
            Some(rest) if rest > 0 => Ok(rest),
            _ => Err(WalletError::insufficient(Shortfall::Fee)),
        };
    }
    if requested.saturating_add(fee) > balance {
        return Err(WalletError::insufficient(Shortfall::Fee));
    }
    Ok(requested)
}

fn positive(amount: u64) -> WalletResult<u64> {
    if amount == 0 {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

fn signing_key(key: &ChainKey) -> WalletResult<SigningKey> {
    let bytes = Zeroizing::new(
        bs58::decode(key.secret_key.as_str())
            .into_vec()
            .map_err(|e| WalletError::InvalidSecretKey(e.to_string()))?,
    );
    let keypair: &[u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| WalletError::InvalidSecretKey("expected a 64-byte keypair".to_string()))?;
    let signing = SigningKey::from_keypair_bytes(keypair)
        .map_err(|e| WalletError::InvalidSecretKey(e.to_string()))?;

    let address = bs58::encode(signing.verifying_key().as_bytes()).into_string();
    if address != key.address {
        return Err(WalletError::InvalidSecretKey(format!(
            "secret does not belong to {}",
            key.address
        )));
    }
    Ok(signing)
}

fn program(id: &str) -> WalletResult<Pubkey> {
    id.parse()
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> WalletResult<Pubkey> {
    let token_program = program(TOKEN_PROGRAM_ID)?;
    let (address, _) = find_program_address(
        &[&owner.0, &token_program.0, &mint.0],
        &program(ASSOCIATED_TOKEN_PROGRAM_ID)?,
    )?;
    Ok(address)
}

fn set_compute_unit_limit(units: u32) -> WalletResult<Instruction> {
    let mut data = vec![2u8];
    data.extend_from_slice(&units.to_le_bytes());
    Ok(Instruction {
        program_id: program(COMPUTE_BUDGET_PROGRAM_ID)?,
        accounts: vec![],
        data,
    })
}

fn set_compute_unit_price(micro_lamports: u64) -> WalletResult<Instruction> {
    let mut data = vec![3u8];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Ok(Instruction {
        program_id: program(COMPUTE_BUDGET_PROGRAM_ID)?,
        accounts: vec![],
        data,
    })
}

fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> WalletResult<Instruction> {
    let mut data = 2u32.to_le_bytes().to_vec();
    data.extend_from_slice(&lamports.to_le_bytes());
    Ok(Instruction {
        program_id: program(SYSTEM_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    })
}

fn create_associated_token_account(
    payer: &Pubkey,
    ata: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> WalletResult<Instruction> {
    Ok(Instruction {
        program_id: program(ASSOCIATED_TOKEN_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(*ata, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(program(SYSTEM_PROGRAM_ID)?, false),
            AccountMeta::readonly(program(TOKEN_PROGRAM_ID)?, false),
        ],
        data: vec![],
    })
}

fn transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> WalletResult<Instruction> {
    let mut data = vec![12u8];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Ok(Instruction {
        program_id: program(TOKEN_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
        data,
    })
}
