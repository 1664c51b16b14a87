use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::enums::{ TransferStage, TxStatus };
use crate::error::Result as AppResult;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub chain: String,
    pub direction: String,
    pub amount: String,
    pub fee: String,
    pub from_address: String,
    pub to_address: String,
    pub tx_hash: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id",
        on_delete = "Cascade"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> AppResult<TxStatus> {
        self.status.parse()
    }

    pub fn stage(&self) -> AppResult<TransferStage> {
        Ok(self.status()?.transfer_stage())
    }
}
