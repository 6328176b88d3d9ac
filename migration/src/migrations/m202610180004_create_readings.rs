use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Readings {
    Table,
    Id,
    MetricId,
    Timestamp,
}

#[derive(DeriveIden)]
enum Metrics {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610180004_create_readings"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Readings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Readings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Readings::MetricId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Readings::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_readings_metric_id")
                            .from(Readings::Table, Readings::MetricId)
                            .to(Metrics::Table, Metrics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_readings_metric_timestamp")
                    .table(Readings::Table)
                    .col(Readings::MetricId)
                    .col(Readings::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Readings::Table).to_owned())
            .await
    }
}
