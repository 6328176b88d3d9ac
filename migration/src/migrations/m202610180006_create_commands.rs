use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Commands {
    Table,
    Id,
    DeviceId,
    CommandText,
    Executed,
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
        "m202610180006_create_commands"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commands::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Commands::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Commands::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(Commands::CommandText).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Commands::Executed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Commands::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_commands_device_id")
                            .from(Commands::Table, Commands::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_commands_device_executed")
                    .table(Commands::Table)
                    .col(Commands::DeviceId)
                    .col(Commands::Executed)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Commands::Table).to_owned())
            .await
    }
}
