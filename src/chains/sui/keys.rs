// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sui key codec, addresses, and intent signing.
//!
//! - Secret keys are bech32 `suiprivkey` strings over `flag || secret[32]`
//! - Addresses are `0x || hex(blake2b256(flag || pubkey))`
//! - Transaction signatures are `base64(flag || sig[64] || pubkey[32])`,
//!   signed over `blake2b256(intent[3] || tx_bytes)`

use base64ct::{Base64, Encoding};
use bech32::{Bech32, Hrp};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

type Blake2b256 = Blake2b<U32>;

pub const SUI_PRIVATE_KEY_PREFIX: &str = "suiprivkey";

/// Signature scheme flags.
pub const ED25519_FLAG: u8 = 0x00;
const SECP256K1_FLAG: u8 = 0x01;
const SECP256R1_FLAG: u8 = 0x02;

/// Intent for a user transaction: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Encode a 32-byte ed25519 secret as `suiprivkey1...`.
pub fn encode_secret(secret: &[u8; 32]) -> WalletResult<String> {
    let mut payload = Zeroizing::new([0u8; 33]);
    payload[0] = ED25519_FLAG;
    payload[1..].copy_from_slice(secret);

    let hrp = Hrp::parse(SUI_PRIVATE_KEY_PREFIX)
        .map_err(|e| WalletError::InvalidSecretKey(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, payload.as_slice())
        .map_err(|e| WalletError::InvalidSecretKey(e.to_string()))
}

/// Decode a `suiprivkey1...` string into the ed25519 secret bytes.
pub fn decode_secret(encoded: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
    let (hrp, data) = bech32::decode(encoded.trim())
        .map_err(|e| WalletError::InvalidSecretKey(e.to_string()))?;
    let data = Zeroizing::new(data);

    if hrp.to_lowercase() != SUI_PRIVATE_KEY_PREFIX {
        return Err(WalletError::InvalidSecretKey(
            "invalid private key prefix".to_string(),
        ));
    }
    let Some((&flag, secret)) = data.split_first() else {
        return Err(WalletError::InvalidSecretKey("empty key payload".to_string()));
    };
    match flag {
        ED25519_FLAG => {}
        SECP256K1_FLAG | SECP256R1_FLAG => {
            return Err(WalletError::InvalidSecretKey(format!(
                "unsupported signature scheme flag {flag:#04x}"
            )))
        }
        other => {
            return Err(WalletError::InvalidSecretKey(format!(
                "unknown signature scheme flag {other:#04x}"
            )))
        }
    }

    let mut out = Zeroizing::new([0u8; 32]);
    if secret.len() != out.len() {
        return Err(WalletError::InvalidSecretKey(format!(
            "expected 32-byte secret, got {}",
            secret.len()
        )));
    }
    out.copy_from_slice(secret);
    Ok(out)
}

/// Sui address for an ed25519 public key.
pub fn address_of(public: &VerifyingKey) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// `0x` plus 64 hex digits. The prefix is optional, as on the node.
pub fn is_valid_address(address: &str) -> bool {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Canonical lowercase `0x`-prefixed form of a valid address.
pub fn normalize_address(address: &str) -> WalletResult<String> {
    if !is_valid_address(address) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Sign base64 transaction bytes and return the serialized signature.
pub fn sign_transaction(signing: &SigningKey, tx_bytes_b64: &str) -> WalletResult<String> {
    let tx_bytes = Base64::decode_vec(tx_bytes_b64)
        .map_err(|e| WalletError::TransactionRejected(format!("txBytes: {e}")))?;

    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(&tx_bytes);
    let digest = hasher.finalize();

    let signature = signing.sign(&digest);
    let mut serialized = Vec::with_capacity(1 + 64 + 32);
    serialized.push(ED25519_FLAG);
    serialized.extend_from_slice(&signature.to_bytes());
    serialized.extend_from_slice(signing.verifying_key().as_bytes());
    Ok(Base64::encode_string(&serialized))
}
