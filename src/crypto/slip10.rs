// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SLIP-0010 key derivation for ed25519.
//!
//! Only hardened children exist on this curve, so every path segment must
//! carry the `'` marker: `m/44'/501'/0'/0'` is accepted, `m/44'/501'/0'/0`
//! is not.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{WalletError, WalletResult};

type HmacSha512 = Hmac<Sha512>;

const MASTER_SECRET: &[u8] = b"ed25519 seed";
const HARDENED: u32 = 0x8000_0000;

/// Derive the 32-byte ed25519 private key at `path` from a BIP-39 seed.
pub fn derive(seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
    let indices = parse_path(path)?;

    let (mut key, mut chain_code) = split(hmac_sha512(MASTER_SECRET, &[seed])?);
    for index in indices {
        let child = hmac_sha512(
            chain_code.as_slice(),
            &[&[0x00], key.as_slice(), &(index | HARDENED).to_be_bytes()],
        )?;
        key.zeroize();
        chain_code.zeroize();
        (key, chain_code) = split(child);
    }
    chain_code.zeroize();

    Ok(Zeroizing::new(key))
}

/// Parse `m/a'/b'/...` into raw (unhardened) indices.
pub fn parse_path(path: &str) -> WalletResult<Vec<u32>> {
    let mut segments = path.trim().split('/');
    if segments.next() != Some("m") {
        return Err(invalid_path(path, "must start with m"));
    }

    segments
        .map(|segment| {
            let raw = segment
                .strip_suffix('\'')
                .ok_or_else(|| invalid_path(path, "ed25519 requires hardened segments"))?;
            let index: u32 = raw
                .parse()
                .map_err(|_| invalid_path(path, "segment is not a number"))?;
            if index >= HARDENED {
                return Err(invalid_path(path, "segment out of range"));
            }
            Ok(index)
        })
        .collect()
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::InvalidSecretKey(format!("HMAC init failed: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(buf: Zeroizing<[u8; 64]>) -> ([u8; 32], [u8; 32]) {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&buf[..32]);
    chain_code.copy_from_slice(&buf[32..]);
    (key, chain_code)
}

fn invalid_path(path: &str, reason: &str) -> WalletError {
    WalletError::InvalidSecretKey(format!("derivation path `{path}`: {reason}"))
}
