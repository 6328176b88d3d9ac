use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ReadingValues {
    Table,
    Id,
    ReadingId,
    MetricFieldId,
    Value,
}

#[derive(DeriveIden)]
enum Readings {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum MetricFields {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610180005_create_reading_values"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReadingValues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReadingValues::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReadingValues::ReadingId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ReadingValues::MetricFieldId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReadingValues::Value).string_len(255).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reading_values_reading_id")
                            .from(ReadingValues::Table, ReadingValues::ReadingId)
                            .to(Readings::Table, Readings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reading_values_metric_field_id")
                            .from(ReadingValues::Table, ReadingValues::MetricFieldId)
                            .to(MetricFields::Table, MetricFields::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("uq_reading_metric_field")
                            .col(ReadingValues::ReadingId)
                            .col(ReadingValues::MetricFieldId)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReadingValues::Table).to_owned())
            .await
    }
}
