pub mod models;
pub mod test_utils;

use common::config;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;

/// Opens the aggregator database named by `DATABASE_PATH`.
///
/// A `sqlite:` DSN is used as-is; anything else without a scheme is treated
/// as a SQLite file path whose parent directory is created on demand. Only
/// the SQLite driver is built in, so other URL schemes are refused.
pub async fn connect() -> Result<DatabaseConnection, DbErr> {
    let url = database_url(&config::database_path())?;
    log::debug!("Connecting to {url}");
    Database::connect(&url).await
}

fn database_url(path_or_url: &str) -> Result<String, DbErr> {
    if path_or_url.starts_with("sqlite:") {
        return Ok(path_or_url.to_owned());
    }
    if let Some((scheme, _)) = path_or_url.split_once("://") {
        return Err(DbErr::Custom(format!(
            "Unsupported database scheme '{scheme}': only SQLite is available"
        )));
    }

    // SQLite won't create intermediate dirs.
    if let Some(parent) = Path::new(path_or_url).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    Ok(format!("sqlite://{path_or_url}?mode=rwc"))
}
