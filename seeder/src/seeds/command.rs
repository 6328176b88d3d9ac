use crate::seed::{SeedFuture, Seeder};
use crate::seeds::device::DEVICES;
use sea_orm::DatabaseConnection;
use services::command_service::CommandService;
use services::error::ServiceError;

pub struct CommandSeeder;

impl Seeder for CommandSeeder {
    fn seed<'a>(&'a self, db: &'a DatabaseConnection) -> SeedFuture<'a> {
        Box::pin(async move {
            let (_, local) = DEVICES[0];
            match CommandService::send(db, local, "open taskmanager").await {
                Ok(_) => Ok(()),
                // Re-seeding an existing database hits the mailbox rules.
                Err(ServiceError::CommandAlreadyPending { .. } | ServiceError::CooldownActive { .. }) => {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
    }
}
