use db::models::device;
use log::info;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Validate)]
pub struct NewRegistration {
    #[validate(length(min = 1, max = 50, message = "Role must be 1 to 50 characters"))]
    pub role: String,

    #[validate(length(min = 1, max = 50, message = "Friendly name must be 1 to 50 characters"))]
    pub friendly_name: String,
}

impl NewRegistration {
    pub fn new(role: &str, friendly_name: &str) -> Self {
        Self {
            role: role.trim().to_owned(),
            friendly_name: friendly_name.trim().to_owned(),
        }
    }
}

/// Identity handed back to a newly registered collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub device_guid: String,
    pub friendly_name: String,
    pub role: String,
}

pub struct RegistrationService;

impl RegistrationService {
    pub async fn register(
        db: &DatabaseConnection,
        role: &str,
        friendly_name: &str,
    ) -> ServiceResult<Registration> {
        let request = NewRegistration::new(role, friendly_name);
        request
            .validate()
            .map_err(|e| ServiceError::InvalidRegistration(e.to_string()))?;

        let dev = device::Model::register(db, &request.role, &request.friendly_name).await?;
        info!("Registered device '{}' as {}", dev.friendly_name, dev.role);

        Ok(Registration {
            device_guid: dev.guid,
            friendly_name: dev.friendly_name,
            role: dev.role,
        })
    }

    /// Removes a device together with its metrics, readings and commands.
    pub async fn deregister(db: &DatabaseConnection, device_guid: &str) -> ServiceResult<()> {
        let dev = device::Model::find_by_guid(db, device_guid)
            .await?
            .ok_or_else(|| ServiceError::DeviceNotFound(device_guid.to_owned()))?;

        device::Model::delete(db, dev.id).await?;
        info!("Deregistered device '{}'", dev.friendly_name);
        Ok(())
    }
}
