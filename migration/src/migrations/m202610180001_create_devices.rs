use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    Guid,
    FriendlyName,
    Role,
    CreatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610180001_create_devices"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Devices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Devices::Guid).string_len(36).not_null().unique_key())
                    .col(ColumnDef::new(Devices::FriendlyName).string_len(50).not_null())
                    .col(ColumnDef::new(Devices::Role).string_len(50).not_null())
                    .col(
                        ColumnDef::new(Devices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Commands address devices by their friendly name.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_devices_friendly_name")
                    .table(Devices::Table)
                    .col(Devices::FriendlyName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Devices::Table).to_owned())
            .await
    }
}
