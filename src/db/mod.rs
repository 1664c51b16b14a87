use migration::{ Migrator, MigratorTrait };
use sea_orm::{
    entity::prelude::*,
    ConnectOptions,
    Database,
    DatabaseConnection,
    DbErr,
    QueryOrder,
    Set,
    Unchanged,
};
use uuid::Uuid;

use crate::enums::Chain;
use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod transaction_repository;
pub use transaction_repository::{ NewTransaction, TransactionRepository };

/// Connect and bring the schema up to date.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);

    // Each in-memory SQLite connection is a separate database
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;

    tracing::info!("Database connected and migrated");
    Ok(db)
}

/// Fields fixed at wallet creation.
pub struct NewWallet {
    pub owner_id: String,
    pub chain: Chain,
    pub name: String,
    pub address: String,
    pub encrypted_private_key: String,
}

#[derive(Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
}

impl WalletRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_wallet: NewWallet) -> Result<entity::wallet::Model> {
        let now = chrono::Utc::now();
        let wallet = entity::wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(new_wallet.owner_id),
            chain: Set(new_wallet.chain.as_str().to_string()),
            name: Set(new_wallet.name),
            address: Set(new_wallet.address),
            encrypted_private_key: Set(new_wallet.encrypted_private_key),
            balance: Set("0".to_string()),
            pending_debit: Set("0".to_string()),
            decimals: Set(new_wallet.chain.decimals() as i16),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let wallet = wallet.insert(&self.db).await?;
        Ok(wallet)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<entity::wallet::Model> {
        entity::wallet::Entity::find_by_id(id).one(&self.db).await?.ok_or(AppError::WalletNotFound)
    }

    /// Oldest first.
    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<entity::wallet::Model>> {
        let wallets = entity::wallet::Entity
            ::find()
            .filter(entity::wallet::Column::OwnerId.eq(owner_id))
            .order_by_asc(entity::wallet::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(wallets)
    }

    pub async fn find_by_owner_and_chain(
        &self,
        owner_id: &str,
        chain: Chain
    ) -> Result<Vec<entity::wallet::Model>> {
        let wallets = entity::wallet::Entity
            ::find()
            .filter(entity::wallet::Column::OwnerId.eq(owner_id))
            .filter(entity::wallet::Column::Chain.eq(chain.as_str()))
            .order_by_asc(entity::wallet::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(wallets)
    }

    /// Persist name and balance and bump `updated_at`. The pending debit is
    /// owned by `TransactionRepository::record_send`/`settle_send`; identity,
    /// chain, address and key are never rewritten.
    pub async fn update(&self, wallet: &entity::wallet::Model) -> Result<entity::wallet::Model> {
        let active = entity::wallet::ActiveModel {
            id: Unchanged(wallet.id),
            name: Set(wallet.name.clone()),
            balance: Set(wallet.balance.clone()),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        active.update(&self.db).await.map_err(|e| {
            match e {
                DbErr::RecordNotUpdated => AppError::WalletNotFound,
                other => AppError::Database(other),
            }
        })
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = entity::wallet::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::WalletNotFound);
        }
        Ok(())
    }
}
