use secrecy::{ ExposeSecret, SecretSlice };
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NetworkPolicy;
use crate::crypto::Encryptor;
use crate::db::{ entity::wallet, NewWallet, WalletRepository };
use crate::enums::Chain;
use crate::error::{ AppError, Result };
use crate::rpc::AdapterRegistry;
use crate::services::locks::WalletLocks;
use crate::units::format_units;

const BALANCE_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Wallet registry: creation, lookup and balance bookkeeping.
pub struct WalletService {
    repository: Arc<WalletRepository>,
    adapters: Arc<AdapterRegistry>,
    encryptor: Arc<Encryptor>,
    locks: Arc<WalletLocks>,
    policy: NetworkPolicy,
}

impl WalletService {
    pub fn new(
        repository: Arc<WalletRepository>,
        adapters: Arc<AdapterRegistry>,
        encryptor: Arc<Encryptor>,
        locks: Arc<WalletLocks>,
        policy: NetworkPolicy
    ) -> Self {
        Self {
            repository,
            adapters,
            encryptor,
            locks,
            policy,
        }
    }

    pub async fn create_wallet(&self, owner_id: &str, chain: &str, name: &str) -> Result<wallet::Model> {
        let chain: Chain = chain.parse()?;
        let adapter = self.adapters.get_adapter(chain).await?;

        let key_pair = adapter.generate_key_pair()?;
        if adapter.derive_address(&key_pair.public_key)? != key_pair.address {
            return Err(AppError::Internal(format!("{} address derivation mismatch", chain)));
        }

        let encrypted_private_key = self.encryptor.encrypt(key_pair.private_key.expose_secret())?;

        let name = match name.trim() {
            "" => format!("{} Wallet", chain.display_name()),
            trimmed => trimmed.to_string(),
        };

        let wallet = self.repository.create(NewWallet {
            owner_id: owner_id.to_string(),
            chain,
            name,
            address: key_pair.address,
            encrypted_private_key,
        }).await?;

        tracing::info!(wallet_id = %wallet.id, chain = %chain, address = %wallet.address, "Wallet created");
        Ok(wallet)
    }

    /// Create one wallet for every supported chain the owner has none for.
    pub async fn ensure_default_wallets(&self, owner_id: &str) -> Result<Vec<wallet::Model>> {
        for chain in self.adapters.supported_chains().await {
            if self.repository.find_by_owner_and_chain(owner_id, chain).await?.is_empty() {
                self.create_wallet(owner_id, chain.as_str(), "").await?;
            }
        }

        self.list_wallets(owner_id).await
    }

    pub async fn get_wallet(&self, wallet_id: Uuid) -> Result<wallet::Model> {
        self.repository.find_by_id(wallet_id).await
    }

    pub async fn list_wallets(&self, owner_id: &str) -> Result<Vec<wallet::Model>> {
        self.repository.find_by_owner(owner_id).await
    }

    pub async fn list_wallets_by_chain(&self, owner_id: &str, chain: &str) -> Result<Vec<wallet::Model>> {
        let chain: Chain = chain.parse()?;
        self.repository.find_by_owner_and_chain(owner_id, chain).await
    }

    /// Query the chain and store the result. A failed query never reaches
    /// the caller; the last stored balance is returned instead.
    pub async fn refresh_balance(&self, wallet_id: Uuid) -> Result<String> {
        let wallet = self.repository.find_by_id(wallet_id).await?;
        let chain = wallet.chain()?;

        let balance = match self.query_balance(chain, &wallet.address).await {
            Ok(units) => format_units(units, chain.decimals()),
            Err(e) => {
                tracing::warn!(
                    wallet_id = %wallet_id,
                    chain = %chain,
                    error = %e,
                    "Balance query failed, keeping last known balance"
                );
                return Ok(wallet.balance);
            }
        };

        let _guard = self.locks.acquire(wallet_id).await;
        let mut wallet = self.repository.find_by_id(wallet_id).await?;
        wallet.balance = balance;
        let wallet = self.repository.update(&wallet).await?;

        tracing::debug!(wallet_id = %wallet_id, balance = %wallet.balance, "Balance refreshed");
        Ok(wallet.balance)
    }

    /// Balance minus pending sends, native units.
    pub async fn available_balance(&self, wallet_id: Uuid) -> Result<String> {
        let wallet = self.repository.find_by_id(wallet_id).await?;
        Ok(format_units(wallet.available_units()?, wallet.chain()?.decimals()))
    }

    /// Persist the name and balance of `wallet`. Its pending debit is
    /// ignored so a stale snapshot cannot release funds held by sends.
    pub async fn update_wallet(&self, wallet: &wallet::Model) -> Result<wallet::Model> {
        let _guard = self.locks.acquire(wallet.id).await;
        self.repository.update(wallet).await
    }

    pub async fn rename_wallet(&self, wallet_id: Uuid, name: &str) -> Result<wallet::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Wallet name cannot be empty".to_string()));
        }

        let _guard = self.locks.acquire(wallet_id).await;
        let mut wallet = self.repository.find_by_id(wallet_id).await?;
        wallet.name = name.to_string();
        self.repository.update(&wallet).await
    }

    pub async fn delete_wallet(&self, wallet_id: Uuid) -> Result<()> {
        {
            let _guard = self.locks.acquire(wallet_id).await;
            self.repository.delete(wallet_id).await?;
        }
        self.locks.remove(wallet_id).await;

        tracing::info!(wallet_id = %wallet_id, "Wallet deleted");
        Ok(())
    }

    /// Decrypted signing key. Callers drop it as soon as the transfer is
    /// signed.
    pub(crate) fn decrypt_private_key(&self, wallet: &wallet::Model) -> Result<SecretSlice<u8>> {
        self.encryptor.decrypt(&wallet.encrypted_private_key)
    }

    async fn query_balance(&self, chain: Chain, address: &str) -> Result<u128> {
        let timeout = self.policy.timeout(chain);
        let mut attempt = 0;

        loop {
            let adapter = self.adapters.get_adapter(chain).await?;

            let result = match tokio::time::timeout(timeout, adapter.get_balance(address)).await {
                Ok(result) => result,
                Err(_) =>
                    Err(AppError::BalanceQuery(format!("Timed out after {}s", timeout.as_secs()))),
            };

            match result {
                Ok(balance) => {
                    return Ok(balance);
                }
                Err(e) if attempt < self.policy.balance_query_retries => {
                    attempt += 1;
                    tracing::debug!(chain = %chain, attempt, error = %e, "Retrying balance query");
                    tokio::time::sleep(BALANCE_RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ Harness, MockAdapter };

    #[tokio::test]
    async fn test_create_wallet_encrypts_key() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;

        let wallet = harness.wallets.create_wallet("alice", "ethereum", "Main").await.unwrap();

        assert_eq!(wallet.chain, "ETH");
        assert_eq!(wallet.name, "Main");
        assert_eq!(wallet.decimals, 18);
        assert_eq!(wallet.balance, "0");
        assert!(wallet.address.starts_with("0x"));

        // Stored key is ciphertext that decrypts to a usable secp256k1 key
        let secret = harness.wallets.decrypt_private_key(&wallet).unwrap();
        assert_eq!(secret.expose_secret().len(), 32);
        assert!(!wallet.encrypted_private_key.contains(&hex::encode(secret.expose_secret())));

        let json = serde_json::to_string(&wallet).unwrap();
        assert!(!json.contains("encrypted_private_key"));
    }

    #[tokio::test]
    async fn test_create_wallet_rejects_unknown_chain() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;

        let result = harness.wallets.create_wallet("alice", "dogecoin", "").await;
        assert!(matches!(result, Err(AppError::UnsupportedChain(_))));

        // Known chain without a configured adapter
        let result = harness.wallets.create_wallet("alice", "btc", "").await;
        assert!(matches!(result, Err(AppError::UnsupportedChain(_))));
    }

    #[tokio::test]
    async fn test_default_name_and_listing_order() {
        let harness = Harness::new(
            vec![MockAdapter::new(Chain::Eth), MockAdapter::new(Chain::Solana)]
        ).await;

        let first = harness.wallets.create_wallet("alice", "sol", "  ").await.unwrap();
        let second = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();
        harness.wallets.create_wallet("bob", "eth", "").await.unwrap();

        assert_eq!(first.name, "Solana Wallet");

        let ids: Vec<Uuid> = harness.wallets
            .list_wallets("alice").await
            .unwrap()
            .iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let eth = harness.wallets.list_wallets_by_chain("alice", "ETH").await.unwrap();
        assert_eq!(eth.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_default_wallets_is_idempotent() {
        let harness = Harness::new(
            vec![
                MockAdapter::new(Chain::Eth),
                MockAdapter::new(Chain::Btc),
                MockAdapter::new(Chain::Solana)
            ]
        ).await;

        harness.wallets.create_wallet("alice", "btc", "Cold").await.unwrap();

        let wallets = harness.wallets.ensure_default_wallets("alice").await.unwrap();
        assert_eq!(wallets.len(), 3);

        let again = harness.wallets.ensure_default_wallets("alice").await.unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(
            again.iter().filter(|w| w.chain == "BTC").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_refresh_balance_tracks_chain() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;
        let wallet = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();

        assert_eq!(harness.wallets.refresh_balance(wallet.id).await.unwrap(), "0");

        harness.adapter(Chain::Eth).set_balance(1_500_000_000_000_000_000);
        assert_eq!(harness.wallets.refresh_balance(wallet.id).await.unwrap(), "1.5");
        assert_eq!(harness.wallets.get_wallet(wallet.id).await.unwrap().balance, "1.5");
    }

    #[tokio::test]
    async fn test_refresh_balance_falls_back_on_failure() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;
        let wallet = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();
        let adapter = harness.adapter(Chain::Eth);

        adapter.set_balance(2_000_000_000_000_000_000);
        harness.wallets.refresh_balance(wallet.id).await.unwrap();

        adapter.fail_balance_queries(true);
        adapter.reset_network_calls();
        assert_eq!(harness.wallets.refresh_balance(wallet.id).await.unwrap(), "2");

        // One attempt plus the configured retry
        assert_eq!(adapter.network_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_balance_falls_back_on_timeout() {
        let harness = Harness::with_network_timeout(
            vec![MockAdapter::new(Chain::Eth)],
            Duration::from_millis(50)
        ).await;
        let wallet = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();
        let adapter = harness.adapter(Chain::Eth);

        adapter.set_balance(750_000_000_000_000_000);
        harness.wallets.refresh_balance(wallet.id).await.unwrap();

        adapter.set_balance(5_000_000_000_000_000_000);
        adapter.hang(true);
        adapter.reset_network_calls();

        assert_eq!(harness.wallets.refresh_balance(wallet.id).await.unwrap(), "0.75");
        assert_eq!(harness.wallets.get_wallet(wallet.id).await.unwrap().balance, "0.75");
        assert_eq!(adapter.network_calls(), 2);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;
        let wallet = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();

        let renamed = harness.wallets.rename_wallet(wallet.id, " Trading ").await.unwrap();
        assert_eq!(renamed.name, "Trading");
        assert_eq!(renamed.address, wallet.address);

        assert!(matches!(
            harness.wallets.rename_wallet(wallet.id, "   ").await,
            Err(AppError::InvalidInput(_))
        ));

        harness.wallets.delete_wallet(wallet.id).await.unwrap();
        assert!(matches!(harness.wallets.get_wallet(wallet.id).await, Err(AppError::WalletNotFound)));
        assert!(matches!(harness.wallets.delete_wallet(wallet.id).await, Err(AppError::WalletNotFound)));
    }

    #[tokio::test]
    async fn test_update_wallet_keeps_address() {
        let harness = Harness::new(vec![MockAdapter::new(Chain::Eth)]).await;
        let wallet = harness.wallets.create_wallet("alice", "eth", "").await.unwrap();

        let mut changed = wallet.clone();
        changed.balance = "3.25".to_string();
        changed.address = "0x0000000000000000000000000000000000000000".to_string();

        let updated = harness.wallets.update_wallet(&changed).await.unwrap();
        assert_eq!(updated.balance, "3.25");
        assert_eq!(updated.address, wallet.address);
        assert_eq!(harness.wallets.available_balance(wallet.id).await.unwrap(), "3.25");
    }
}
