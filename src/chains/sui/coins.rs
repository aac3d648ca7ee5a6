// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coin object listing and selection.

use serde::Deserialize;
use serde_json::json;

use crate::chains::rpc::{decode, JsonRpc, RpcError};
use crate::error::{Shortfall, WalletError, WalletResult};

/// Page size requested from `suix_getCoins`.
const PAGE_LIMIT: u32 = 50;

/// One spendable coin object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub object_id: String,
    pub balance: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinRecord {
    coin_object_id: String,
    balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinRecord>,
    next_cursor: Option<String>,
    has_next_page: bool,
}

/// Every coin of `coin_type` owned by `owner`, in node order.
pub async fn fetch_all(rpc: &dyn JsonRpc, owner: &str, coin_type: &str) -> WalletResult<Vec<Coin>> {
    let mut coins = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let result = rpc
            .call("suix_getCoins", json!([owner, coin_type, cursor, PAGE_LIMIT]))
            .await?;
        let page: CoinPage = decode("suix_getCoins", result)?;

        for record in page.data {
            let balance = record.balance.parse().map_err(|_| {
                RpcError::Decode(format!("coin balance `{}`", record.balance))
            })?;
            coins.push(Coin {
                object_id: record.coin_object_id,
                balance,
            });
        }

        match page.next_cursor {
            Some(next) if page.has_next_page => cursor = Some(next),
            _ => break,
        }
    }

    Ok(coins)
}

/// Take coins in the given order until they cover `amount`.
///
/// The selected coins are merged and split on chain, so no single coin
/// needs to hold the exact amount.
pub fn select(coins: &[Coin], amount: u64) -> WalletResult<Vec<Coin>> {
    let mut selected = Vec::new();
    let mut total: u128 = 0;

    for coin in coins {
        selected.push(coin.clone());
        total += coin.balance as u128;
        if total >= amount as u128 {
            return Ok(selected);
        }
    }

    Err(WalletError::insufficient(Shortfall::Amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::rpc::fake::FakeRpc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn coin(id: &str, balance: u64) -> Coin {
        Coin { object_id: id.to_string(), balance }
    }

    #[test]
    fn selects_in_order_until_covered() {
        let coins = [coin("a", 5), coin("b", 3), coin("c", 10)];
        let picked = select(&coins, 7).unwrap();
        assert_eq!(picked, vec![coin("a", 5), coin("b", 3)]);

        assert_eq!(select(&coins, 5).unwrap(), vec![coin("a", 5)]);
        assert_eq!(select(&coins, 18).unwrap().len(), 3);
    }

    #[test]
    fn exhausting_coins_is_insufficient_amount() {
        let coins = [coin("a", 5), coin("b", 3)];
        assert!(matches!(
            select(&coins, 9),
            Err(WalletError::InsufficientBalance { shortfall: Shortfall::Amount })
        ));
        assert!(select(&[], 1).is_err());
    }

    #[tokio::test]
    async fn follows_pagination_cursor() {
        let rpc = FakeRpc::new();
        let page = Arc::new(AtomicUsize::new(0));
        let counter = page.clone();
        rpc.on("suix_getCoins", move |params| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => {
                    assert!(params[2].is_null());
                    Ok(json!({
                        "data": [{ "coinType": "0x2::sui::SUI", "coinObjectId": "0x1", "balance": "10" }],
                        "nextCursor": "0x1",
                        "hasNextPage": true
                    }))
                }
                _ => {
                    assert_eq!(params[2], "0x1");
                    Ok(json!({
                        "data": [{ "coinType": "0x2::sui::SUI", "coinObjectId": "0x2", "balance": "20" }],
                        "nextCursor": "0x2",
                        "hasNextPage": false
                    }))
                }
            }
        });

        let coins = fetch_all(rpc.as_ref(), "0xowner", "0x2::sui::SUI").await.unwrap();
        assert_eq!(coins, vec![coin("0x1", 10), coin("0x2", 20)]);
        assert_eq!(rpc.calls_to("suix_getCoins"), 2);
    }
}
