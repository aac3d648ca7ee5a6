// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Engine - Self-Custody Multi-Chain Key Management
//!
//! Derives Solana and Sui keys from one recovery phrase, keeps them in a
//! local redb store, and builds, signs, and broadcasts transfers.
//!
//! ## Modules
//!
//! - `crypto` - BIP-39, SLIP-0010, passphrase backup encryption
//! - `chains` - Solana and Sui adapters behind one closed enum
//! - `storage` - wallets, accounts, secrets, recents, active-account pointer
//! - `transfer` - send flow with cancellation and confirmation
//! - `auth` - backend login and account-link payloads
//! - `state` - `WalletEngine` composition root

pub mod auth;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod state;
pub mod storage;
pub mod transfer;
