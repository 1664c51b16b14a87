use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chains::{ bitcoin::BitcoinAdapter, evm::EvmAdapter, solana::SolanaAdapter };
use crate::config::Config;
use crate::enums::Chain;
use crate::error::{ AppError, Result };
use crate::providers::ChainAdapter;

#[derive(Default)]
struct ChainPool {
    adapters: Vec<Arc<dyn ChainAdapter>>,
    current_index: usize,
}

/// Chain adapters keyed by chain, one per configured endpoint, handed out
/// round-robin.
#[derive(Default)]
pub struct AdapterRegistry {
    pools: RwLock<HashMap<Chain, ChainPool>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let registry = Self::new();
        let testnet = config.is_testnet();

        for (chain, chain_config) in &config.chain_configs {
            for url in &chain_config.rpc_urls {
                let adapter: Result<Arc<dyn ChainAdapter>> = match chain {
                    Chain::Eth => {
                        let chain_id = chain_config.chain_id.ok_or_else(||
                            AppError::Config("ETH chain id is not configured".to_string())
                        )?;
                        EvmAdapter::new(url, chain_id).map(|a| Arc::new(a) as Arc<dyn ChainAdapter>)
                    }
                    Chain::Btc =>
                        BitcoinAdapter::new(url, testnet).map(
                            |a| Arc::new(a) as Arc<dyn ChainAdapter>
                        ),
                    Chain::Solana => Ok(Arc::new(SolanaAdapter::new(url)) as Arc<dyn ChainAdapter>),
                };

                match adapter {
                    Ok(adapter) => registry.register(adapter).await,
                    Err(e) => tracing::warn!("Failed to create {} adapter for {}: {}", chain, url, e),
                }
            }

            if !registry.supports(*chain).await {
                return Err(AppError::Config(format!("No valid {} RPC endpoints configured", chain)));
            }
        }

        Ok(registry)
    }

    pub async fn register(&self, adapter: Arc<dyn ChainAdapter>) {
        let mut pools = self.pools.write().await;
        pools.entry(adapter.chain()).or_default().adapters.push(adapter);
    }

    pub async fn supports(&self, chain: Chain) -> bool {
        self.pools
            .read().await
            .get(&chain)
            .is_some_and(|pool| !pool.adapters.is_empty())
    }

    pub async fn supported_chains(&self) -> Vec<Chain> {
        let pools = self.pools.read().await;
        Chain::all()
            .iter()
            .copied()
            .filter(|chain| pools.get(chain).is_some_and(|pool| !pool.adapters.is_empty()))
            .collect()
    }

    pub async fn get_adapter(&self, chain: Chain) -> Result<Arc<dyn ChainAdapter>> {
        let mut pools = self.pools.write().await;

        let pool = pools
            .get_mut(&chain)
            .filter(|pool| !pool.adapters.is_empty())
            .ok_or_else(|| AppError::UnsupportedChain(chain.to_string()))?;

        let adapter = pool.adapters[pool.current_index].clone();

        // Round-robin to next adapter for next request
        pool.current_index = (pool.current_index + 1) % pool.adapters.len();

        Ok(adapter)
    }

    /// Skip the next adapter in line (useful when the current one fails).
    pub async fn rotate(&self, chain: Chain) -> Result<()> {
        let mut pools = self.pools.write().await;

        let pool = pools
            .get_mut(&chain)
            .filter(|pool| !pool.adapters.is_empty())
            .ok_or_else(|| AppError::UnsupportedChain(chain.to_string()))?;

        pool.current_index = (pool.current_index + 1) % pool.adapters.len();
        tracing::info!("Rotated {} adapter to index {}", chain, pool.current_index);
        Ok(())
    }
}
