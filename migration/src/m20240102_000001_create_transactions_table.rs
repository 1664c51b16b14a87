use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Transaction::Table)
                .if_not_exists()
                .col(ColumnDef::new(Transaction::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Transaction::WalletId).uuid().not_null())
                .col(ColumnDef::new(Transaction::Chain).string_len(20).not_null())
                .col(ColumnDef::new(Transaction::Direction).string_len(10).not_null())
                .col(ColumnDef::new(Transaction::Amount).string_len(80).not_null())
                .col(ColumnDef::new(Transaction::Fee).string_len(80).not_null())
                .col(ColumnDef::new(Transaction::FromAddress).string().not_null())
                .col(ColumnDef::new(Transaction::ToAddress).string().not_null())
                .col(ColumnDef::new(Transaction::TxHash).string().not_null())
                .col(ColumnDef::new(Transaction::Status).string_len(20).not_null())
                .col(
                    ColumnDef::new(Transaction::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Transaction::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_transaction_wallet")
                        .from(Transaction::Table, Transaction::WalletId)
                        .to(Wallet::Table, Wallet::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_transaction_wallet_id")
                .table(Transaction::Table)
                .col(Transaction::WalletId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_transaction_tx_hash")
                .table(Transaction::Table)
                .col(Transaction::TxHash)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Transaction::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Transaction {
    Table,
    Id,
    WalletId,
    Chain,
    Direction,
    Amount,
    Fee,
    FromAddress,
    ToAddress,
    TxHash,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Wallet {
    Table,
    Id,
}
