pub mod command_service;
pub mod error;
pub mod history_service;
pub mod ingest_service;
pub mod payload;
pub mod query_service;
pub mod registration_service;
pub mod schema_service;
pub mod util;
