// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BIP-39 recovery phrases.
//!
//! Phrases are normalized (single spaces, trimmed) before anything else sees
//! them, so the wallet id and the derived keys do not depend on stray
//! whitespace in user input.

use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{WalletError, WalletResult};

/// Accepted phrase lengths.
pub const SUPPORTED_WORD_COUNTS: [usize; 2] = [12, 24];

/// Collapse whitespace runs into single spaces.
pub fn normalize(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse and checksum-validate a phrase.
pub fn parse(phrase: &str) -> WalletResult<Mnemonic> {
    let normalized = Zeroizing::new(normalize(phrase));
    let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if !SUPPORTED_WORD_COUNTS.contains(&words) {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected 12 or 24 words, got {words}"
        )));
    }

    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Check a phrase without keeping the parsed value.
pub fn validate(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Generate a fresh 24-word phrase from OS entropy.
pub fn generate() -> WalletResult<String> {
    let mut entropy = [0u8; 32];
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy);
    entropy.zeroize();
    mnemonic
        .map(|m| m.to_string())
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// BIP-39 seed (empty passphrase) for a validated phrase.
pub fn to_seed(phrase: &str) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}

/// Content-derived wallet id: base58(sha256(normalized phrase)).
///
/// Re-importing the same phrase always yields the same id.
pub fn wallet_id(phrase: &str) -> String {
    let normalized = Zeroizing::new(normalize(phrase));
    let digest = Sha256::digest(normalized.as_bytes());
    bs58::encode(digest).into_string()
}
