use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum MetricFields {
    Table,
    Id,
    MetricId,
    FieldIndex,
    FieldName,
    FieldType,
}

#[derive(DeriveIden)]
enum Metrics {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610180003_create_metric_fields"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MetricFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MetricFields::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MetricFields::MetricId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MetricFields::FieldIndex)
                            .integer()
                            .not_null()
                            .check(Expr::col(MetricFields::FieldIndex).between(1, 5)),
                    )
                    .col(ColumnDef::new(MetricFields::FieldName).string_len(50).not_null())
                    .col(ColumnDef::new(MetricFields::FieldType).string_len(16).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metric_fields_metric_id")
                            .from(MetricFields::Table, MetricFields::MetricId)
                            .to(Metrics::Table, Metrics::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("uq_metric_field_index")
                            .col(MetricFields::MetricId)
                            .col(MetricFields::FieldIndex)
                            .unique(),
                    )
                    .index(
                        Index::create()
                            .name("uq_metric_field_name")
                            .col(MetricFields::MetricId)
                            .col(MetricFields::FieldName)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MetricFields::Table).to_owned())
            .await
    }
}
