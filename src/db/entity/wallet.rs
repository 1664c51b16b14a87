use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::enums::Chain as ChainKind;
use crate::error::Result as AppResult;
use crate::units::parse_units;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub chain: String,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing)]
    pub encrypted_private_key: String,
    /// Last observed on-chain balance, native units.
    pub balance: String,
    /// Amount plus fee of sends that are still pending, native units.
    pub pending_debit: String,
    pub decimals: i16,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn chain(&self) -> AppResult<ChainKind> {
        self.chain.parse()
    }

    fn unit_decimals(&self) -> u8 {
        u8::try_from(self.decimals).unwrap_or(0)
    }

    pub fn balance_units(&self) -> AppResult<u128> {
        parse_units(&self.balance, self.unit_decimals())
    }

    pub fn pending_units(&self) -> AppResult<u128> {
        parse_units(&self.pending_debit, self.unit_decimals())
    }

    /// Balance not yet committed to pending sends.
    pub fn available_units(&self) -> AppResult<u128> {
        Ok(self.balance_units()?.saturating_sub(self.pending_units()?))
    }
}
