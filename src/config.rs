use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::enums::Chain;

const DEFAULT_BALANCE_QUERY_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NetworkMode {
    Testnet,
    Mainnet,
}

/// Per-chain configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain: Chain,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub chain_id: Option<u64>,
    pub native_symbol: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub network_mode: NetworkMode,
    pub database_url: String,
    pub chain_configs: HashMap<Chain, ChainConfig>,
    pub balance_query_retries: u32,
    /// Replaces every chain's own network timeout when set.
    pub network_timeout: Option<Duration>,
    pub key_store_path: Option<PathBuf>,
}

/// Retry and timeout knobs shared by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPolicy {
    pub balance_query_retries: u32,
    pub timeout_override: Option<Duration>,
}

impl NetworkPolicy {
    pub fn timeout(&self, chain: Chain) -> Duration {
        self.timeout_override.unwrap_or_else(|| chain.transaction_timeout())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
        where F: Fn(&str) -> Option<String>
    {
        let network_mode = match
            lookup("NETWORK_MODE")
                .ok_or("NETWORK_MODE is not set")?
                .to_lowercase()
                .as_str()
        {
            "mainnet" => NetworkMode::Mainnet,
            "testnet" => NetworkMode::Testnet,
            _ => {
                return Err("NETWORK_MODE must be 'testnet' or 'mainnet'".into());
            }
        };

        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL is not set")?;

        let is_testnet = matches!(network_mode, NetworkMode::Testnet);
        let mode_suffix = if is_testnet { "TESTNET" } else { "MAINNET" };

        // Build chain configs dynamically from env vars
        let mut chain_configs = HashMap::new();

        for &chain in Chain::all() {
            let rpc_key = format!("{}_{}_RPC_URLS", chain.as_str(), mode_suffix);
            let explorer_key = format!("{}_{}_EXPLORER_URL", chain.as_str(), mode_suffix);

            // Only configure chains that have RPC URLs set
            if let Some(rpc_val) = lookup(&rpc_key) {
                let rpc_urls = Self::parse_rpc_urls(&rpc_val)?;
                let explorer_url = lookup(&explorer_key).unwrap_or_else(||
                    chain.explorer_url(is_testnet).to_string()
                );

                chain_configs.insert(chain, ChainConfig {
                    chain,
                    rpc_urls,
                    explorer_url,
                    chain_id: chain.chain_id(is_testnet),
                    native_symbol: chain.native_symbol().to_string(),
                });
            }
        }

        if chain_configs.is_empty() {
            return Err("No chain RPC URLs configured. Set at least one *_RPC_URLS env var.".into());
        }

        let balance_query_retries = match lookup("BALANCE_QUERY_RETRIES") {
            Some(value) => value.parse()?,
            None => DEFAULT_BALANCE_QUERY_RETRIES,
        };

        let network_timeout = match lookup("NETWORK_TIMEOUT_SECS") {
            Some(value) => {
                let secs: u64 = value.parse()?;
                if secs == 0 {
                    return Err("NETWORK_TIMEOUT_SECS must be greater than zero".into());
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let key_store_path = lookup("KEY_STORE_PATH").map(PathBuf::from);

        Ok(Config {
            network_mode,
            database_url,
            chain_configs,
            balance_query_retries,
            network_timeout,
            key_store_path,
        })
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        NetworkPolicy {
            balance_query_retries: self.balance_query_retries,
            timeout_override: self.network_timeout,
        }
    }

    fn parse_rpc_urls(urls_str: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let urls: Vec<String> = urls_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if urls.is_empty() {
            return Err("RPC URLs list cannot be empty".into());
        }

        Ok(urls)
    }

    /// Whether we are running in testnet mode.
    pub fn is_testnet(&self) -> bool {
        matches!(self.network_mode, NetworkMode::Testnet)
    }

    /// Get the explorer base URL for a specific chain.
    pub fn explorer_url(&self, chain: Chain) -> String {
        self.chain_configs
            .get(&chain)
            .map(|cc| cc.explorer_url.clone())
            .unwrap_or_else(|| chain.explorer_url(self.is_testnet()).to_string())
    }

    /// Generate a transaction explorer URL for a specific chain and tx hash.
    pub fn tx_explorer_url(&self, chain: Chain, tx_hash: &str) -> String {
        Self::join_explorer_path(&self.explorer_url(chain), &format!("tx/{}", tx_hash))
    }

    /// Generate an address explorer URL for a specific chain and address.
    pub fn address_explorer_url(&self, chain: Chain, address: &str) -> String {
        Self::join_explorer_path(&self.explorer_url(chain), &format!("address/{}", address))
    }

    // Solana explorer URLs carry the cluster as a query string.
    fn join_explorer_path(base_url: &str, path: &str) -> String {
        match base_url.split_once('?') {
            Some((base, query)) => format!("{}/{}?{}", base.trim_end_matches('/'), path, query),
            None => format!("{}/{}", base_url.trim_end_matches('/'), path),
        }
    }

    /// Get list of configured chains.
    pub fn configured_chains(&self) -> Vec<Chain> {
        self.chain_configs.keys().copied().collect()
    }
}
