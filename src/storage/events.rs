// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Post-commit change notifications.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Wallet,
    Account,
    Secret,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Delete,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub table: Table,
    pub kind: ChangeKind,
}

/// Fan-out of [`TableChange`]s, emitted only after the write committed.
///
/// Slow subscribers may observe `RecvError::Lagged`; the events carry no
/// row data, so re-reading the table is always the right recovery.
#[derive(Debug, Clone)]
pub struct StoreEvents {
    sender: broadcast::Sender<TableChange>,
}

impl Default for StoreEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, table: Table, kind: ChangeKind) {
        // No subscribers is the common case.
        let _ = self.sender.send(TableChange { table, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_changes_in_order() {
        let events = StoreEvents::new();
        let mut rx = events.subscribe();

        events.emit(Table::Wallet, ChangeKind::Insert);
        events.emit(Table::Secret, ChangeKind::Clear);

        assert_eq!(
            rx.recv().await.unwrap(),
            TableChange { table: Table::Wallet, kind: ChangeKind::Insert }
        );
        assert_eq!(rx.recv().await.unwrap().table, Table::Secret);
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        StoreEvents::new().emit(Table::Recent, ChangeKind::Insert);
    }
}
