use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202610180001_create_devices::Migration),
            Box::new(migrations::m202610180002_create_metrics::Migration),
            Box::new(migrations::m202610180003_create_metric_fields::Migration),
            Box::new(migrations::m202610180004_create_readings::Migration),
            Box::new(migrations::m202610180005_create_reading_values::Migration),
            Box::new(migrations::m202610180006_create_commands::Migration),
        ]
    }
}
