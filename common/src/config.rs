//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! Every value has a default, so library code and tests can read the
//! configuration without any environment being set up.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};
use std::time::Duration;

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// Minimum age of the last executed command before a device accepts a new one.
    pub command_cooldown_seconds: u64,
    pub history_default_page_size: u64,
    pub history_max_page_size: u64,
    /// How many times a single metric submission is attempted when it loses a
    /// uniqueness race against a concurrent producer.
    pub ingest_max_attempts: u32,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or malformed values fall back to their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "metrics-aggregator".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "logs/aggregator.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "true".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/aggregator.db".into()),
            command_cooldown_seconds: parse_or("COMMAND_COOLDOWN_SECONDS", 180),
            history_default_page_size: parse_or("HISTORY_DEFAULT_PAGE_SIZE", 20),
            history_max_page_size: parse_or("HISTORY_MAX_PAGE_SIZE", 500),
            ingest_max_attempts: parse_or("INGEST_MAX_ATTEMPTS", 3),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered rather than propagated; the configuration
    /// holds plain values and cannot be left half-written.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        match lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        AppConfig::set_field(|cfg| *cfg = AppConfig::from_env());
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = match lock.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_command_cooldown_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.command_cooldown_seconds = value);
    }

    pub fn set_history_default_page_size(value: u64) {
        AppConfig::set_field(|cfg| cfg.history_default_page_size = value);
    }

    pub fn set_history_max_page_size(value: u64) {
        AppConfig::set_field(|cfg| cfg.history_max_page_size = value);
    }

    pub fn set_ingest_max_attempts(value: u32) {
        AppConfig::set_field(|cfg| cfg.ingest_max_attempts = value);
    }
}

// --- Free-standing getters ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn command_cooldown() -> Duration {
    Duration::from_secs(AppConfig::global().command_cooldown_seconds)
}

pub fn history_default_page_size() -> u64 {
    AppConfig::global().history_default_page_size.max(1)
}

pub fn history_max_page_size() -> u64 {
    AppConfig::global().history_max_page_size.max(1)
}

pub fn ingest_max_attempts() -> u32 {
    AppConfig::global().ingest_max_attempts.max(1)
}
