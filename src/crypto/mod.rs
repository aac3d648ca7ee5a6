// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material: recovery phrases, SLIP-0010 derivation, and backup
//! encryption. Nothing in here touches the network or the disk.

pub mod mnemonic;
pub mod passphrase;
pub mod slip10;

pub use passphrase::{decrypt_text, encrypt_text};
