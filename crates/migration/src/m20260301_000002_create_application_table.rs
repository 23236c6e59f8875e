//! Creates the registered client application table.
//!
//! `client_id` carries a unique index: credential uniqueness is enforced here, not in the
//! application code.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Application::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Application::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Application::Name).string().not_null())
                    .col(ColumnDef::new(Application::ClientId).string().not_null())
                    .col(ColumnDef::new(Application::ClientSecret).string().not_null())
                    // JSON array, ordered
                    .col(ColumnDef::new(Application::RedirectUris).text().not_null())
                    .col(
                        ColumnDef::new(Application::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Application::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_application_client_id")
                    .table(Application::Table)
                    .col(Application::ClientId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Application::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Application {
    Table,
    Id,
    Name,
    ClientId,
    ClientSecret,
    RedirectUris,
    CreatedAt,
    UpdatedAt,
}
