// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain tag to adapter lookup.
//!
//! Adapters are built on first use and shared afterwards. All of them reuse
//! one HTTP client so connection pools and the request timeout are common.

use std::sync::{Arc, OnceLock};

use super::rpc::{http_client, HttpJsonRpc, JsonRpc};
use super::types::NetworkConfig;
use super::{Chain, ChainOperations, SolanaChain, SuiChain};
use crate::config::{ConfirmPolicy, EngineConfig};
use crate::error::WalletResult;

pub type Transport = Arc<dyn Fn(&NetworkConfig) -> Arc<dyn JsonRpc> + Send + Sync>;

#[derive(Clone)]
pub struct ChainRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    solana_network: NetworkConfig,
    sui_network: NetworkConfig,
    confirm: ConfirmPolicy,
    transport: Transport,
    solana: OnceLock<SolanaChain>,
    sui: OnceLock<SuiChain>,
}

impl ChainRegistry {
    /// Registry backed by HTTP JSON-RPC at the configured endpoints.
    pub fn new(config: &EngineConfig) -> WalletResult<Self> {
        let client = http_client(config.rpc_timeout)?;
        let transport: Transport = Arc::new(move |network: &NetworkConfig| {
            Arc::new(HttpJsonRpc::new(network.rpc_url.to_string(), client.clone()))
                as Arc<dyn JsonRpc>
        });
        Ok(Self::with_transport(config, transport))
    }

    /// Registry whose adapters talk through `transport` instead of HTTP.
    pub fn with_transport(config: &EngineConfig, transport: Transport) -> Self {
        Self {
            inner: Arc::new(Inner {
                solana_network: config.solana.clone(),
                sui_network: config.sui.clone(),
                confirm: config.confirm,
                transport,
                solana: OnceLock::new(),
                sui: OnceLock::new(),
            }),
        }
    }

    /// Adapter for `chain`. Construction happens at most once per chain.
    pub fn get(&self, chain: Chain) -> ChainOperations {
        let inner = &self.inner;
        match chain {
            Chain::Solana => ChainOperations::Solana(
                inner
                    .solana
                    .get_or_init(|| {
                        tracing::debug!(chain = %chain, rpc = %inner.solana_network.rpc_url, "Initializing chain adapter");
                        SolanaChain::new(
                            (inner.transport)(&inner.solana_network),
                            inner.solana_network.clone(),
                        )
                    })
                    .clone(),
            ),
            Chain::Sui => ChainOperations::Sui(
                inner
                    .sui
                    .get_or_init(|| {
                        tracing::debug!(chain = %chain, rpc = %inner.sui_network.rpc_url, "Initializing chain adapter");
                        SuiChain::new(
                            (inner.transport)(&inner.sui_network),
                            inner.sui_network.clone(),
                            inner.confirm,
                        )
                    })
                    .clone(),
            ),
        }
    }

    /// One adapter per supported chain, in [`Chain::ALL`] order.
    pub fn all(&self) -> Vec<ChainOperations> {
        Chain::ALL.iter().map(|chain| self.get(*chain)).collect()
    }

    /// Registry whose adapters share one scripted transport.
    #[cfg(test)]
    pub(crate) fn scripted(rpc: Arc<super::rpc::fake::FakeRpc>) -> Self {
        let config = EngineConfig {
            confirm: ConfirmPolicy {
                attempts: 3,
                interval: std::time::Duration::from_millis(10),
            },
            ..EngineConfig::default()
        };
        let transport: Transport =
            Arc::new(move |_: &NetworkConfig| rpc.clone() as Arc<dyn JsonRpc>);
        Self::with_transport(&config, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::rpc::fake::FakeRpc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn adapters_are_built_once_per_chain() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let transport: Transport = Arc::new(move |_: &NetworkConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            FakeRpc::new() as Arc<dyn JsonRpc>
        });
        let registry = ChainRegistry::with_transport(&EngineConfig::default(), transport);

        assert_eq!(registry.get(Chain::Sui).chain(), Chain::Sui);
        assert_eq!(registry.get(Chain::Sui).symbol(), "SUI");
        assert_eq!(registry.get(Chain::Solana).symbol(), "SOL");
        assert_eq!(built.load(Ordering::SeqCst), 2);

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].chain(), Chain::Solana);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn http_registry_uses_configured_explorers() {
        let registry = ChainRegistry::new(&EngineConfig::default()).unwrap();
        assert_eq!(
            registry.get(Chain::Solana).explorer_url_for_tx("abc"),
            "https://solscan.io/tx/abc"
        );
        assert_eq!(
            registry.get(Chain::Sui).explorer_url_for_tx("D"),
            "https://suiscan.xyz/mainnet/tx/D"
        );
    }
}
