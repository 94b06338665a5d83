//! Migration to create the installations table.
//!
//! `installation_id` is not unique; redelivered installation-created
//! webhooks add rows. Keyed by a surrogate UUID.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Installations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Installations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Installations::InstallationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Installations::OwnerId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Installations::AuthorizedRepos)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Installations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_installations_installation_id")
                    .table(Installations::Table)
                    .col(Installations::InstallationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_installations_owner_id")
                    .table(Installations::Table)
                    .col(Installations::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_installations_installation_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_installations_owner_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Installations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Installations {
    Table,
    Id,
    InstallationId,
    OwnerId,
    AuthorizedRepos,
    CreatedAt,
}
