use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    DatabaseConnection,
    DbErr,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
    Set,
    TransactionTrait,
    Unchanged,
};
use uuid::Uuid;

use crate::db::entity::{ transaction, wallet, Transaction };
use crate::enums::{ Chain, TxDirection, TxStatus };
use crate::error::{ AppError, Result };

/// A transaction record about to be written.
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub chain: Chain,
    pub direction: TxDirection,
    pub amount: String,
    pub fee: String,
    pub from_address: String,
    pub to_address: String,
    pub tx_hash: String,
}

#[derive(Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn active_model(new_tx: NewTransaction) -> transaction::ActiveModel {
        let now = chrono::Utc::now();
        transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(new_tx.wallet_id),
            chain: Set(new_tx.chain.as_str().to_string()),
            direction: Set(new_tx.direction.as_str().to_string()),
            amount: Set(new_tx.amount),
            fee: Set(new_tx.fee),
            from_address: Set(new_tx.from_address),
            to_address: Set(new_tx.to_address),
            tx_hash: Set(new_tx.tx_hash),
            status: Set(TxStatus::Pending.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    pub async fn create(&self, new_tx: NewTransaction) -> Result<transaction::Model> {
        let transaction = Self::active_model(new_tx).insert(&self.db).await?;
        Ok(transaction)
    }

    /// Insert a pending send and set the wallet's pending debit in one
    /// database transaction.
    pub async fn record_send(
        &self,
        new_tx: NewTransaction,
        pending_debit: String
    ) -> Result<transaction::Model> {
        let wallet_id = new_tx.wallet_id;
        let txn = self.db.begin().await?;

        let record = Self::active_model(new_tx).insert(&txn).await?;
        set_pending_debit(&txn, wallet_id, pending_debit).await?;

        txn.commit().await?;
        Ok(record)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<transaction::Model> {
        Transaction::find_by_id(id).one(&self.db).await?.ok_or(AppError::TransactionNotFound)
    }

    /// Newest first.
    pub async fn find_by_wallet_id(
        &self,
        wallet_id: Uuid,
        limit: Option<u64>,
        offset: Option<u64>
    ) -> Result<Vec<transaction::Model>> {
        let transactions = Transaction::find()
            .filter(transaction::Column::WalletId.eq(wallet_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db).await?;

        Ok(transactions)
    }

    pub async fn update_status(&self, id: Uuid, status: TxStatus) -> Result<transaction::Model> {
        let active = status_update(id, status);
        active.update(&self.db).await.map_err(not_found_as_transaction)
    }

    /// Move a send out of pending and release its debit in one database
    /// transaction.
    pub async fn settle_send(
        &self,
        id: Uuid,
        status: TxStatus,
        wallet_id: Uuid,
        pending_debit: String
    ) -> Result<transaction::Model> {
        let txn = self.db.begin().await?;

        let record = status_update(id, status).update(&txn).await.map_err(not_found_as_transaction)?;
        set_pending_debit(&txn, wallet_id, pending_debit).await?;

        txn.commit().await?;
        Ok(record)
    }
}

fn status_update(id: Uuid, status: TxStatus) -> transaction::ActiveModel {
    transaction::ActiveModel {
        id: Unchanged(id),
        status: Set(status.as_str().to_string()),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
}

fn not_found_as_transaction(e: DbErr) -> AppError {
    match e {
        DbErr::RecordNotUpdated => AppError::TransactionNotFound,
        other => AppError::Database(other),
    }
}

async fn set_pending_debit<C: sea_orm::ConnectionTrait>(
    conn: &C,
    wallet_id: Uuid,
    pending_debit: String
) -> Result<()> {
    let active = wallet::ActiveModel {
        id: Unchanged(wallet_id),
        pending_debit: Set(pending_debit),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    active.update(conn).await.map_err(|e| {
        match e {
            DbErr::RecordNotUpdated => AppError::WalletNotFound,
            other => AppError::Database(other),
        }
    })?;
    Ok(())
}
