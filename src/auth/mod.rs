// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Backend Authentication Payloads
//!
//! The engine never talks to the backend itself; it only produces the
//! signed payloads the backend expects.
//!
//! ## Login
//!
//! The active primary-chain key signs `/auth/login/<address>?timestamp=<ms>`.
//! The backend checks the signature against the address and the timestamp
//! against its clock window.
//!
//! ## Account Linking
//!
//! Binding a secondary-chain address to the primary account takes two
//! signatures over the fixed challenge template:
//!
//! - `proof_signature`: the secondary key signs the challenge naming the
//!   primary address (proves control of the secondary key)
//! - `link_signature`: the primary key signs the challenge naming the
//!   secondary address (proves the primary account asked for the link)
//!
//! The challenge wording is a wire constant shared with the backend.
//!
//! The proofs travel in a JSON body posted to `/auth/link`. The primary key
//! also signs `<path><body>` and the signature rides in the query string,
//! so the body must be sent byte-for-byte as signed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chains::{Chain, ChainKey, ChainRegistry};
use crate::error::{WalletError, WalletResult};
use crate::storage::ChainAddress;

const LINK_CHALLENGE_PREFIX: &str = "I agree to give all my money now and in the future to ";

/// Backend endpoint that receives link proofs.
pub const LINK_PATH: &str = "/auth/link";

/// Message signed for a login request.
pub fn login_message(address: &str, timestamp: &str) -> String {
    format!("/auth/login/{address}?timestamp={timestamp}")
}

/// Challenge naming the address that receives the link.
pub fn link_challenge(address: &str) -> String {
    format!("{LINK_CHALLENGE_PREFIX}{address}")
}

/// Query parameters of the backend login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginParams {
    #[serde(rename = "public_key")]
    pub address: String,
    /// Milliseconds since the Unix epoch, as sent.
    pub timestamp: String,
    pub signature: String,
}

/// One secondary address with both link signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkAccount {
    pub address: String,
    pub chain: Chain,
    pub proof_signature: String,
    pub link_signature: String,
}

#[derive(Serialize)]
struct LinkRequestBody<'a> {
    public_key: &'a str,
    timestamp: i64,
    accounts: &'a [LinkAccount],
}

/// A link request ready to post: `path?signature=<signature>` with `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedLinkRequest {
    pub path: String,
    pub body: String,
    pub signature: String,
}

/// Primary-key signature over a request envelope, `<path><body>`.
pub fn link_request_signature(
    chains: &ChainRegistry,
    signer: &ChainKey,
    path: &str,
    body: &str,
) -> WalletResult<String> {
    ensure_primary(signer)?;
    chains
        .get(Chain::PRIMARY)
        .sign_message(signer, &format!("{path}{body}"))
}

/// Serialize `accounts` into a [`LINK_PATH`] body and sign it.
pub fn link_request(
    chains: &ChainRegistry,
    primary: &ChainKey,
    accounts: &[LinkAccount],
    now: DateTime<Utc>,
) -> WalletResult<SignedLinkRequest> {
    let body = serde_json::to_string(&LinkRequestBody {
        public_key: &primary.address,
        timestamp: now.timestamp_millis(),
        accounts,
    })?;
    let signature = link_request_signature(chains, primary, LINK_PATH, &body)?;

    tracing::debug!(address = %primary.address, accounts = accounts.len(), "Signed link request");
    Ok(SignedLinkRequest {
        path: LINK_PATH.to_string(),
        body,
        signature,
    })
}

fn ensure_primary(key: &ChainKey) -> WalletResult<()> {
    if key.chain != Chain::PRIMARY {
        return Err(WalletError::InvalidSecretKey(format!(
            "link requests must be signed by a {} key",
            Chain::PRIMARY
        )));
    }
    Ok(())
}

/// Sign a login payload with `signer` at time `now`.
pub fn login_params(
    chains: &ChainRegistry,
    signer: &ChainKey,
    now: DateTime<Utc>,
) -> WalletResult<LoginParams> {
    let timestamp = now.timestamp_millis().to_string();
    let message = login_message(&signer.address, &timestamp);
    let signature = chains.get(signer.chain).sign_message(signer, &message)?;

    tracing::debug!(address = %signer.address, %timestamp, "Signed login payload");
    Ok(LoginParams {
        address: signer.address.clone(),
        timestamp,
        signature,
    })
}

/// Link signatures for each of `linked` under the `primary` account key.
pub fn link_proofs(
    chains: &ChainRegistry,
    primary: &ChainKey,
    linked: &[ChainKey],
) -> WalletResult<Vec<LinkAccount>> {
    ensure_primary(primary)?;
    let primary_ops = chains.get(Chain::PRIMARY);
    let proof_message = link_challenge(&primary.address);

    linked
        .iter()
        .filter(|key| key.address != primary.address)
        .map(|key| {
            let proof_signature = chains.get(key.chain).sign_message(key, &proof_message)?;
            let link_signature = primary_ops.sign_message(primary, &link_challenge(&key.address))?;
            Ok(LinkAccount {
                address: key.address.clone(),
                chain: key.chain,
                proof_signature,
                link_signature,
            })
        })
        .collect()
}

/// Local addresses the backend does not know about yet.
pub fn missing_links(local: &[ChainAddress], remote: &[ChainAddress]) -> Vec<ChainAddress> {
    local
        .iter()
        .filter(|key| !remote.contains(key))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::rpc::fake::FakeRpc;
    use crate::crypto::mnemonic::tests::ZOO_24;
    use chrono::TimeZone;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn verify_b58(public_b58: &str, message: &str, signature_b58: &str) {
        let pk: [u8; 32] = bs58::decode(public_b58).into_vec().unwrap().try_into().unwrap();
        let sig: [u8; 64] = bs58::decode(signature_b58).into_vec().unwrap().try_into().unwrap();
        VerifyingKey::from_bytes(&pk)
            .unwrap()
            .verify(message.as_bytes(), &Signature::from_bytes(&sig))
            .unwrap();
    }

    fn keys(chains: &ChainRegistry) -> (ChainKey, ChainKey) {
        (
            chains.get(Chain::Solana).generate_key_from_mnemonic(ZOO_24, 0).unwrap(),
            chains.get(Chain::Sui).generate_key_from_mnemonic(ZOO_24, 0).unwrap(),
        )
    }

    #[test]
    fn message_templates_are_stable() {
        assert_eq!(login_message("Abc", "1700000000000"), "/auth/login/Abc?timestamp=1700000000000");
        assert_eq!(
            link_challenge("0x12"),
            "I agree to give all my money now and in the future to 0x12"
        );
    }

    #[test]
    fn login_params_are_signed_by_the_address() {
        let chains = ChainRegistry::scripted(FakeRpc::new());
        let (solana, _) = keys(&chains);
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let params = login_params(&chains, &solana, now).unwrap();
        assert_eq!(params.timestamp, "1700000000123");
        verify_b58(
            &solana.address,
            &login_message(&solana.address, "1700000000123"),
            &params.signature,
        );

        let query = serde_json::to_value(&params).unwrap();
        assert_eq!(query["public_key"], solana.address.as_str());
    }

    #[test]
    fn link_proofs_cross_sign_both_addresses() {
        let chains = ChainRegistry::scripted(FakeRpc::new());
        let (solana, sui) = keys(&chains);

        let links = link_proofs(&chains, &solana, &[solana.clone(), sui.clone()]).unwrap();
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.chain, Chain::Sui);
        assert_eq!(link.address, sui.address);

        let (sui_pk, sui_sig) = link.proof_signature.split_once(':').unwrap();
        verify_b58(sui_pk, &link_challenge(&solana.address), sui_sig);
        verify_b58(&solana.address, &link_challenge(&sui.address), &link.link_signature);
    }

    #[test]
    fn link_proofs_require_primary_anchor() {
        let chains = ChainRegistry::scripted(FakeRpc::new());
        let (solana, sui) = keys(&chains);
        assert!(link_proofs(&chains, &sui, &[solana]).is_err());
    }

    #[test]
    fn link_request_signs_path_and_body() {
        let chains = ChainRegistry::scripted(FakeRpc::new());
        let (solana, sui) = keys(&chains);
        let links = link_proofs(&chains, &solana, &[sui.clone()]).unwrap();
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let request = link_request(&chains, &solana, &links, now).unwrap();
        assert_eq!(request.path, "/auth/link");
        verify_b58(
            &solana.address,
            &format!("/auth/link{}", request.body),
            &request.signature,
        );

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["public_key"], solana.address.as_str());
        assert_eq!(body["timestamp"], 1_700_000_000_123i64);
        assert_eq!(body["accounts"][0]["address"], sui.address.as_str());
        assert!(request.body.starts_with("{\"public_key\":"));

        assert!(link_request_signature(&chains, &sui, LINK_PATH, &request.body).is_err());
    }

    #[test]
    fn missing_links_compares_address_and_chain() {
        let a = ChainAddress { chain: Chain::Solana, address: "A".into() };
        let b = ChainAddress { chain: Chain::Sui, address: "0xb".into() };
        let remote = vec![a.clone()];
        assert_eq!(missing_links(&[a, b.clone()], &remote), vec![b]);
    }
}
