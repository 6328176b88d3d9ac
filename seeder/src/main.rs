use crate::seed::{Seeder, run_seeder};
use crate::seeds::{command::CommandSeeder, device::DeviceSeeder, reading::ReadingSeeder};
use colored::*;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use std::process::ExitCode;

mod seed;
mod seeds;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = common::logger::init_from_config() {
        eprintln!("{}", format!("Logger unavailable: {err}").yellow());
    }

    let db = match db::connect().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("{}", format!("Cannot open database: {err}").red());
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = Migrator::up(&db, None).await {
        eprintln!("{}", format!("Migrations failed: {err}").red());
        return ExitCode::FAILURE;
    }

    let mut ok = true;
    for (seeder, name) in [
        (Box::new(DeviceSeeder) as Box<dyn Seeder + Send + Sync>, "Device"),
        (Box::new(ReadingSeeder), "Reading"),
        (Box::new(CommandSeeder), "Command"),
    ] {
        ok &= run_seeder(&*seeder, name, &db).await;
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
