// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password-based encryption for recovery-phrase backups.
//!
//! ## Blob Format
//!
//! ```text
//! hex(ciphertext):hex(iv):hex(salt):hex(hmac)
//! ```
//!
//! - PBKDF2-HMAC-SHA256, 100,000 iterations, 16-byte random salt, 64-byte
//!   output split into an AES-256 key and an HMAC-SHA256 key
//! - AES-256-CBC with PKCS#7 padding under a 16-byte random IV
//! - HMAC-SHA256 over the lowercase hex text of the ciphertext
//!
//! The MAC is verified in constant time before any decryption happens.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;

struct DerivedKeys {
    encryption: Zeroizing<[u8; KEY_LEN]>,
    mac: Zeroizing<[u8; KEY_LEN]>,
}

fn derive_keys(password: &str, salt: &[u8]) -> DerivedKeys {
    let mut out = Zeroizing::new([0u8; KEY_LEN * 2]);
    pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, out.as_mut_slice());

    let mut encryption = Zeroizing::new([0u8; KEY_LEN]);
    let mut mac = Zeroizing::new([0u8; KEY_LEN]);
    encryption.copy_from_slice(&out[..KEY_LEN]);
    mac.copy_from_slice(&out[KEY_LEN..]);
    DerivedKeys { encryption, mac }
}

fn mac_for(key: &[u8], ciphertext_hex: &str) -> WalletResult<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| WalletError::MalformedCiphertext(format!("HMAC init failed: {e}")))?;
    mac.update(ciphertext_hex.as_bytes());
    Ok(mac)
}

/// Encrypt `plaintext` under `password` into the four-field backup blob.
pub fn encrypt_text(plaintext: &str, password: &str) -> WalletResult<String> {
    let mut iv = [0u8; IV_LEN];
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut iv);
    OsRng.fill_bytes(&mut salt);

    let keys = derive_keys(password, &salt);

    let cipher = Aes256CbcEnc::new_from_slices(keys.encryption.as_slice(), &iv)
        .map_err(|e| WalletError::MalformedCiphertext(format!("cipher init failed: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    let ciphertext_hex = hex::encode(ciphertext);

    let tag = mac_for(keys.mac.as_slice(), &ciphertext_hex)?
        .finalize()
        .into_bytes();

    Ok(format!(
        "{ciphertext_hex}:{}:{}:{}",
        hex::encode(iv),
        hex::encode(salt),
        hex::encode(tag)
    ))
}

/// Decrypt a backup blob produced by [`encrypt_text`].
///
/// A wrong password surfaces as [`WalletError::IntegrityCheckFailed`].
pub fn decrypt_text(blob: &str, password: &str) -> WalletResult<String> {
    let fields: Vec<&str> = blob.trim().split(':').collect();
    let [ciphertext_hex, iv_hex, salt_hex, tag_hex] = fields.as_slice() else {
        return Err(WalletError::MalformedCiphertext(format!(
            "expected 4 fields, got {}",
            fields.len()
        )));
    };

    let iv = decode_field("iv", iv_hex)?;
    let salt = decode_field("salt", salt_hex)?;
    let tag = decode_field("hmac", tag_hex)?;

    let keys = derive_keys(password, &salt);

    if mac_for(keys.mac.as_slice(), ciphertext_hex)?
        .verify_slice(&tag)
        .is_err()
    {
        tracing::warn!("Backup blob failed HMAC verification");
        return Err(WalletError::IntegrityCheckFailed);
    }

    let ciphertext = decode_field("ciphertext", ciphertext_hex)?;
    let cipher = Aes256CbcDec::new_from_slices(keys.encryption.as_slice(), &iv)
        .map_err(|e| WalletError::MalformedCiphertext(format!("iv: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| WalletError::IntegrityCheckFailed)?,
    );

    String::from_utf8(plaintext.to_vec()).map_err(|_| WalletError::IntegrityCheckFailed)
}

fn decode_field(name: &str, value: &str) -> WalletResult<Vec<u8>> {
    hex::decode(value).map_err(|e| WalletError::MalformedCiphertext(format!("{name}: {e}")))
}
