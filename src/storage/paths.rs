// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Data directory layout.

use std::path::{Path, PathBuf};

/// File name of the redb database inside the data directory.
pub const DB_FILE: &str = "wallet.redb";

/// Sub-directory holding the key-value pointer files.
pub const KV_DIR: &str = "kv";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the relational database file.
    pub fn db_file(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    /// Directory containing one file per key-value entry.
    pub fn kv_dir(&self) -> PathBuf {
        self.root.join(KV_DIR)
    }
}
