//! Fresh, fully migrated in-memory databases for tests. Each call gets its
//! own database, so tests never see each other's rows.

use crate::models::device;
use migration::Migrator;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// A migrated database holding one registered device.
pub async fn setup_test_db_with_device(
    role: &str,
    friendly_name: &str,
) -> (DatabaseConnection, device::Model) {
    let db = setup_test_db().await;
    let dev = device::Model::register(&db, role, friendly_name)
        .await
        .expect("Failed to register test device");
    (db, dev)
}
