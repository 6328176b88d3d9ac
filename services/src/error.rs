use sea_orm::DbErr;
use serde::Serialize;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Per-call failures. Every variant is a recoverable outcome of the call that
/// produced it; the display text is meant for the person who made the request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error(
        "A command is already pending for device '{device}'. Please wait until it is executed."
    )]
    CommandAlreadyPending { device: String },

    #[error(
        "A command was executed less than {cooldown_seconds} seconds ago on device '{device}'. \
         Please wait {remaining_seconds} more seconds before sending a new command."
    )]
    CooldownActive {
        device: String,
        cooldown_seconds: u64,
        remaining_seconds: u64,
    },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Why a single metric submission was left out of a batch. Never aborts the
/// rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionError {
    #[error("metric submission has no name")]
    MissingName,

    #[error("metric submission '{0}' has no fields")]
    EmptyFields(String),

    #[error("malformed metric submission: {0}")]
    Malformed(String),
}
