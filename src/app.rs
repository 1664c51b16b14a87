use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::{ Config, NetworkPolicy };
use crate::crypto::{ Encryptor, FileKeyStore, KeyStore, MemoryKeyStore };
use crate::db::{ self, TransactionRepository, WalletRepository };
use crate::error::Result;
use crate::rpc::AdapterRegistry;
use crate::services::{ TransferService, WalletLocks, WalletService };

/// Composition root. Owns one instance of every service; clone the `Arc`
/// handles to share them.
pub struct WalletCore {
    db: DatabaseConnection,
    adapters: Arc<AdapterRegistry>,
    wallets: Arc<WalletService>,
    transfers: Arc<TransferService>,
}

impl WalletCore {
    /// Connect the database, load the encryption key and build adapters
    /// for every configured chain.
    pub async fn bootstrap(config: &Config, key_store: Arc<dyn KeyStore>) -> Result<Self> {
        tracing::info!("Starting wallet core with network mode: {:?}", config.network_mode);

        let db = db::connect(&config.database_url).await?;
        let encryptor = Encryptor::initialize(key_store.as_ref()).await?;
        let adapters = AdapterRegistry::from_config(config).await?;

        tracing::info!(chains = ?adapters.supported_chains().await, "Chain adapters ready");

        Ok(Self::from_parts(db, adapters, encryptor, config.network_policy()))
    }

    /// Wire pre-built components.
    pub fn from_parts(
        db: DatabaseConnection,
        adapters: AdapterRegistry,
        encryptor: Encryptor,
        policy: NetworkPolicy
    ) -> Self {
        let adapters = Arc::new(adapters);
        let locks = Arc::new(WalletLocks::new());

        let wallets = Arc::new(
            WalletService::new(
                Arc::new(WalletRepository::new(db.clone())),
                adapters.clone(),
                Arc::new(encryptor),
                locks.clone(),
                policy
            )
        );

        let transfers = Arc::new(
            TransferService::new(
                wallets.clone(),
                Arc::new(TransactionRepository::new(db.clone())),
                adapters.clone(),
                locks,
                policy
            )
        );

        Self {
            db,
            adapters,
            wallets,
            transfers,
        }
    }

    pub fn wallets(&self) -> Arc<WalletService> {
        self.wallets.clone()
    }

    pub fn transfers(&self) -> Arc<TransferService> {
        self.transfers.clone()
    }

    pub fn adapters(&self) -> Arc<AdapterRegistry> {
        self.adapters.clone()
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// File-backed store at `KEY_STORE_PATH`, or a process-local one when unset.
pub fn key_store_from_config(config: &Config) -> Arc<dyn KeyStore> {
    match &config.key_store_path {
        Some(path) => Arc::new(FileKeyStore::new(path)),
        None => {
            tracing::warn!("KEY_STORE_PATH not set; encryption key will not survive restart");
            Arc::new(MemoryKeyStore::new())
        }
    }
}
