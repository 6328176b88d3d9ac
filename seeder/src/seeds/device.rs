use crate::seed::{SeedFuture, Seeder};
use db::models::device;
use sea_orm::DatabaseConnection;
use services::registration_service::RegistrationService;

/// `(role, friendly_name)` of the collectors shipped with the aggregator.
pub const DEVICES: [(&str, &str); 4] = [
    ("Local-Metrics", "Local-PC"),
    ("OpenSky-ThirdParty", "OpenSky-Data"),
    ("Bitcoin-Collector", "Bitcoin-Metrics"),
    ("ETH-Dominance-Collector", "ETH-Dominance"),
];

pub struct DeviceSeeder;

impl Seeder for DeviceSeeder {
    fn seed<'a>(&'a self, db: &'a DatabaseConnection) -> SeedFuture<'a> {
        Box::pin(async move {
            for (role, friendly_name) in DEVICES {
                if device::Model::find_by_friendly_name(db, friendly_name)
                    .await?
                    .is_none()
                {
                    RegistrationService::register(db, role, friendly_name).await?;
                }
            }
            Ok(())
        })
    }
}
