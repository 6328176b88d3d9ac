use chrono::Local;
use colored::Colorize;
use fern::Dispatch;
use log::LevelFilter;
use std::fs::{OpenOptions, create_dir_all};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Cannot open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Logger already initialised: {0}")]
    AlreadySet(#[from] log::SetLoggerError),
}

pub fn parse_level(log_level: &str) -> LevelFilter {
    match log_level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs the process-wide logger: coloured level names, one line per
/// record, written to `log_file_path` and optionally mirrored to stdout.
///
/// # Errors
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn init_logger(log_level: &str, log_file_path: &str, to_stdout: bool) -> Result<(), LoggerError> {
    let open_error = |source| LoggerError::LogFile {
        path: log_file_path.to_owned(),
        source,
    };

    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent).map_err(open_error)?;
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(open_error)?;

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            let level_str = match record.level() {
                log::Level::Error => "ERROR".red(),
                log::Level::Warn => "WARN".yellow(),
                log::Level::Info => "INFO".green(),
                log::Level::Debug => "DEBUG".cyan(),
                log::Level::Trace => "TRACE".normal(),
            };

            out.finish(format_args!(
                "[{}][{}][{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_str,
                record.target(),
                message
            ))
        })
        .level(parse_level(log_level))
        // sqlx logs every statement at info; keep it out of the aggregator log.
        .level_for("sqlx", LevelFilter::Warn)
        .chain(log_file);

    if to_stdout {
        dispatch = dispatch.chain(std::io::stdout());
    }

    dispatch.apply()?;
    Ok(())
}

/// Initialises the logger from the global [`AppConfig`](crate::config::AppConfig).
///
/// # Errors
/// See [`init_logger`].
pub fn init_from_config() -> Result<(), LoggerError> {
    use crate::config;
    init_logger(&config::log_level(), &config::log_file(), config::log_to_stdout())
}
