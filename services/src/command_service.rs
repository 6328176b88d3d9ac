use chrono::{DateTime, Utc};
use common::config;
use db::models::{command, device};
use log::{debug, info};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Serialize;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::util::format_timestamp;

#[derive(Debug, Clone, Validate)]
struct NewCommand {
    #[validate(length(min = 1, max = 100, message = "Command must be 1 to 100 characters"))]
    text: String,
}

/// A command handed to its device, as it was before being marked executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimedCommand {
    pub id: i64,
    pub command: String,
    pub timestamp: String,
}

impl From<command::Model> for ClaimedCommand {
    fn from(model: command::Model) -> Self {
        Self {
            id: model.id,
            command: model.command_text,
            timestamp: format_timestamp(&model.created_at),
        }
    }
}

/// Resolves a device by friendly name and locks its row for the rest of the
/// transaction.
async fn lock_device(txn: &DatabaseTransaction, device_name: &str) -> ServiceResult<device::Model> {
    let found = device::Model::find_by_friendly_name(txn, device_name)
        .await?
        .ok_or_else(|| ServiceError::DeviceNotFound(device_name.to_owned()))?;
    Ok(device::Model::lock(txn, found.id).await?)
}

pub struct CommandService;

impl CommandService {
    pub async fn send(
        db: &DatabaseConnection,
        device_name: &str,
        text: &str,
    ) -> ServiceResult<command::Model> {
        Self::send_at(db, device_name, text, Utc::now()).await
    }

    /// Queues `text` for the device as of `now`.
    ///
    /// # Errors
    /// - `InvalidCommand` for blank or over-long text.
    /// - `DeviceNotFound` if no device has that friendly name.
    /// - `CommandAlreadyPending` while an earlier command is unclaimed.
    /// - `CooldownActive` if the last executed command was created less than
    ///   the configured cooldown before `now`.
    pub async fn send_at(
        db: &DatabaseConnection,
        device_name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<command::Model> {
        let request = NewCommand {
            text: text.trim().to_owned(),
        };
        request
            .validate()
            .map_err(|e| ServiceError::InvalidCommand(e.to_string()))?;
        let text = request.text.as_str();

        let txn = db.begin().await?;
        let device = lock_device(&txn, device_name).await?;

        if !command::Model::find_pending(&txn, device.id).await?.is_empty() {
            debug!("Rejected command for '{device_name}': one is already pending");
            return Err(ServiceError::CommandAlreadyPending {
                device: device.friendly_name,
            });
        }

        if let Some(last) = command::Model::latest_executed(&txn, device.id).await? {
            let cooldown = config::command_cooldown();
            let cooldown_ms = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
            let elapsed_ms = (now - last.created_at).num_milliseconds();
            if elapsed_ms < cooldown_ms {
                let remaining_ms = cooldown_ms.saturating_sub(elapsed_ms).unsigned_abs();
                let remaining_seconds = remaining_ms.div_ceil(1000);
                debug!("Rejected command for '{device_name}': cooldown, {remaining_seconds}s left");
                return Err(ServiceError::CooldownActive {
                    device: device.friendly_name,
                    cooldown_seconds: cooldown.as_secs(),
                    remaining_seconds,
                });
            }
        }

        let queued = command::Model::create(&txn, device.id, text, now).await?;
        txn.commit().await?;

        info!("Queued command {} for '{device_name}': {text}", queued.id);
        Ok(queued)
    }

    /// Hands over every pending command of the device and marks them
    /// executed in the same transaction. No pending command is an empty list.
    pub async fn claim_pending(
        db: &DatabaseConnection,
        device_name: &str,
    ) -> ServiceResult<Vec<ClaimedCommand>> {
        let txn = db.begin().await?;
        let device = lock_device(&txn, device_name).await?;

        let pending = command::Model::find_pending(&txn, device.id).await?;
        command::Model::mark_executed(&txn, pending.iter().map(|c| c.id).collect()).await?;
        txn.commit().await?;

        if !pending.is_empty() {
            info!("Device '{device_name}' claimed {} command(s)", pending.len());
        }
        Ok(pending.into_iter().map(ClaimedCommand::from).collect())
    }
}
