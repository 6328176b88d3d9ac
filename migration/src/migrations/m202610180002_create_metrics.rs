use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Metrics {
    Table,
    Id,
    DeviceId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610180002_create_metrics"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Metrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Metrics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Metrics::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(Metrics::Name).string_len(50).not_null())
                    .col(
                        ColumnDef::new(Metrics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metrics_device_id")
                            .from(Metrics::Table, Metrics::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("uq_metrics_device_name")
                            .col(Metrics::DeviceId)
                            .col(Metrics::Name)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Metrics::Table).to_owned())
            .await
    }
}
