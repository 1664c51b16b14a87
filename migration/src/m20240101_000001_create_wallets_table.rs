use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Wallet::Table)
                .if_not_exists()
                .col(ColumnDef::new(Wallet::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Wallet::OwnerId).string().not_null())
                .col(ColumnDef::new(Wallet::Chain).string_len(20).not_null())
                .col(ColumnDef::new(Wallet::Name).string().not_null())
                .col(ColumnDef::new(Wallet::Address).string().not_null())
                .col(ColumnDef::new(Wallet::EncryptedPrivateKey).text().not_null())
                .col(ColumnDef::new(Wallet::Balance).string_len(80).not_null().default("0"))
                .col(ColumnDef::new(Wallet::PendingDebit).string_len(80).not_null().default("0"))
                .col(ColumnDef::new(Wallet::Decimals).small_integer().not_null())
                .col(
                    ColumnDef::new(Wallet::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Wallet::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_wallets_owner_chain")
                .table(Wallet::Table)
                .col(Wallet::OwnerId)
                .col(Wallet::Chain)
                .to_owned()
        ).await?;

        // An address belongs to exactly one wallet record
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_wallets_address")
                .table(Wallet::Table)
                .col(Wallet::Address)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Wallet::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Wallet {
    Table,
    Id,
    OwnerId,
    Chain,
    Name,
    Address,
    EncryptedPrivateKey,
    Balance,
    PendingDebit,
    Decimals,
    CreatedAt,
    UpdatedAt,
}
