// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy Solana transaction compiler.
//!
//! ## Wire Layout
//!
//! ```text
//! transaction = compact_u16(n) || signature[64] * n || message
//! message     = header[3] || compact_u16(k) || key[32] * k
//!               || recent_blockhash[32] || compact_u16(m) || instruction * m
//! instruction = program_index:u8 || compact_u16(a) || account_index:u8 * a
//!               || compact_u16(d) || data[d]
//! ```
//!
//! Account keys are ordered: fee payer, other writable signers, read-only
//! signers, writable non-signers, read-only non-signers.

use std::fmt;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::error::{WalletError, WalletResult};

/// A 32-byte Solana account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Whether these bytes decode to a point on the ed25519 curve.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl FromStr for Pubkey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(format!("{s}: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::InvalidAddress(format!("{s}: expected 32 bytes")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

/// Derive a program address: the first bump (255 down) whose hash is off-curve.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> WalletResult<(Pubkey, u8)> {
    for bump in (0..=u8::MAX).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.0);
        hasher.update(b"ProgramDerivedAddress");
        let candidate = Pubkey(hasher.finalize().into());
        if !candidate.is_on_curve() {
            return Ok((candidate, bump));
        }
    }
    Err(WalletError::InvalidAddress(format!(
        "no viable program address for program {program_id}"
    )))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompiledInstruction {
    program_id_index: u8,
    accounts: Vec<u8>,
    data: Vec<u8>,
}

/// A compiled legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions with `payer` as the first (fee-paying) signer.
    pub fn compile(
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: [u8; 32],
    ) -> WalletResult<Self> {
        // (key, signer, writable) in first-seen order; payer is always first.
        let mut metas: Vec<(Pubkey, bool, bool)> = vec![(*payer, true, true)];
        let mut upsert = |key: Pubkey, signer: bool, writable: bool| {
            match metas.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => {
                    entry.1 |= signer;
                    entry.2 |= writable;
                }
                None => metas.push((key, signer, writable)),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let (payer_meta, rest) = metas.split_at(1);
        let bucket = |signer: bool, writable: bool| {
            rest.iter()
                .filter(move |(_, s, w)| *s == signer && *w == writable)
                .copied()
        };
        let ordered: Vec<(Pubkey, bool, bool)> = payer_meta
            .iter()
            .copied()
            .chain(bucket(true, true))
            .chain(bucket(true, false))
            .chain(bucket(false, true))
            .chain(bucket(false, false))
            .collect();

        if ordered.len() > u8::MAX as usize {
            return Err(WalletError::TransactionRejected(
                "too many accounts for a legacy message".to_string(),
            ));
        }

        let count = |pred: fn(&(Pubkey, bool, bool)) -> bool| {
            ordered.iter().filter(|m| pred(m)).count() as u8
        };
        let num_required_signatures = count(|m| m.1);
        let num_readonly_signed = count(|m| m.1 && !m.2);
        let num_readonly_unsigned = count(|m| !m.1 && !m.2);

        let account_keys: Vec<Pubkey> = ordered.iter().map(|m| m.0).collect();
        let index_of = |key: &Pubkey| -> WalletResult<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| WalletError::InvalidAddress(format!("{key} missing from message")))
        };

        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<WalletResult<Vec<u8>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self {
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![
            self.num_required_signatures,
            self.num_readonly_signed,
            self.num_readonly_unsigned,
        ];
        encode_compact_u16(self.account_keys.len(), &mut out);
        for key in &self.account_keys {
            out.extend_from_slice(&key.0);
        }
        out.extend_from_slice(&self.recent_blockhash);
        encode_compact_u16(self.instructions.len(), &mut out);
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(ix.accounts.len(), &mut out);
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(ix.data.len(), &mut out);
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

/// Sign `message` with its single fee-payer key and return
/// `(signature, wire_bytes)`.
pub fn sign_single(message: &Message, signer: &SigningKey) -> WalletResult<([u8; 64], Vec<u8>)> {
    if message.num_required_signatures != 1 {
        return Err(WalletError::TransactionRejected(format!(
            "expected one signer, message requires {}",
            message.num_required_signatures
        )));
    }
    let payer = Pubkey(signer.verifying_key().to_bytes());
    if message.account_keys.first() != Some(&payer) {
        return Err(WalletError::InvalidSecretKey(
            "signing key is not the fee payer".to_string(),
        ));
    }

    let body = message.serialize();
    let signature = signer.sign(&body).to_bytes();

    let mut wire = Vec::with_capacity(1 + 64 + body.len());
    encode_compact_u16(1, &mut wire);
    wire.extend_from_slice(&signature);
    wire.extend_from_slice(&body);
    Ok((signature, wire))
}

/// Solana's variable-length u16 ("shortvec") encoding.
pub fn encode_compact_u16(value: usize, out: &mut Vec<u8>) {
    let mut rem = value as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey([n; 32])
    }

    fn compact(v: usize) -> Vec<u8> {
        let mut out = Vec::new();
        encode_compact_u16(v, &mut out);
        out
    }

    #[test]
    fn compact_u16_matches_shortvec_encoding() {
        assert_eq!(compact(0), vec![0x00]);
        assert_eq!(compact(127), vec![0x7f]);
        assert_eq!(compact(128), vec![0x80, 0x01]);
        assert_eq!(compact(16383), vec![0xff, 0x7f]);
        assert_eq!(compact(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn system_program_is_all_zero_bytes() {
        let system: Pubkey = "11111111111111111111111111111111".parse().unwrap();
        assert_eq!(system.0, [0u8; 32]);
        assert_eq!(system.to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn rejects_wrong_length_addresses() {
        assert!("1111".parse::<Pubkey>().is_err());
        assert!("0OIl".parse::<Pubkey>().is_err());
    }

    #[test]
    fn program_addresses_are_off_curve_and_deterministic() {
        let program = key(9);
        let (a, bump_a) = find_program_address(&[b"seed", &[1, 2, 3]], &program).unwrap();
        let (b, bump_b) = find_program_address(&[b"seed", &[1, 2, 3]], &program).unwrap();
        let (c, _) = find_program_address(&[b"other"], &program).unwrap();
        assert_eq!((a, bump_a), (b, bump_b));
        assert_ne!(a, c);
        assert!(!a.is_on_curve());
    }

    #[test]
    fn real_public_keys_are_on_curve() {
        let signer = SigningKey::from_bytes(&[3u8; 32]);
        assert!(Pubkey(signer.verifying_key().to_bytes()).is_on_curve());
    }

    #[test]
    fn compile_orders_accounts_and_counts_header() {
        let payer = key(1);
        let program = key(50);
        let ix = Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::readonly(key(4), false),
                AccountMeta::writable(key(3), false),
                AccountMeta::writable(payer, true),
            ],
            data: vec![7],
        };

        let message = Message::compile(&payer, &[ix], [0u8; 32]).unwrap();
        assert_eq!(message.account_keys, vec![payer, key(3), key(4), program]);
        assert_eq!(message.num_required_signatures, 1);
        assert_eq!(message.num_readonly_signed, 0);
        assert_eq!(message.num_readonly_unsigned, 2);

        let bytes = message.serialize();
        assert_eq!(&bytes[..3], &[1, 0, 2]);
        assert_eq!(bytes[3], 4);
        // program index, 3 account indices (4, 3, payer), one data byte
        let tail = &bytes[bytes.len() - 7..];
        assert_eq!(tail, &[3, 3, 2, 1, 0, 1, 7]);
    }

    #[test]
    fn duplicate_accounts_merge_privileges() {
        let payer = key(1);
        let shared = key(2);
        let ixs = [
            Instruction {
                program_id: key(60),
                accounts: vec![AccountMeta::readonly(shared, false)],
                data: vec![],
            },
            Instruction {
                program_id: key(61),
                accounts: vec![AccountMeta::writable(shared, false)],
                data: vec![],
            },
        ];
        let message = Message::compile(&payer, &ixs, [0u8; 32]).unwrap();
        assert_eq!(message.account_keys[1], shared);
        assert_eq!(message.num_readonly_unsigned, 2);
    }

    #[test]
    fn signed_transaction_verifies() {
        use ed25519_dalek::{Signature, Verifier};

        let signer = SigningKey::from_bytes(&[5u8; 32]);
        let payer = Pubkey(signer.verifying_key().to_bytes());
        let ix = Instruction {
            program_id: key(70),
            accounts: vec![AccountMeta::writable(payer, true)],
            data: vec![1, 2],
        };
        let message = Message::compile(&payer, &[ix], [8u8; 32]).unwrap();
        let (signature, wire) = sign_single(&message, &signer).unwrap();

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &signature);
        assert_eq!(&wire[65..], message.serialize().as_slice());
        signer
            .verifying_key()
            .verify(&message.serialize(), &Signature::from_bytes(&signature))
            .unwrap();
    }

    #[test]
    fn sign_rejects_foreign_payer() {
        let signer = SigningKey::from_bytes(&[5u8; 32]);
        let message = Message::compile(&key(1), &[], [0u8; 32]).unwrap();
        assert!(sign_single(&message, &signer).is_err());
    }
}
