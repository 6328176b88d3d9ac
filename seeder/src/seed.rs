use colored::*;
use futures::FutureExt;
use sea_orm::DatabaseConnection;
use services::error::ServiceError;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Instant;

const STATUS_COLUMN: usize = 80;

pub type SeedFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>>;

pub trait Seeder {
    fn seed<'a>(&'a self, db: &'a DatabaseConnection) -> SeedFuture<'a>;
}

/// Runs one seeder behind a `Seeding <name>.... done (t)` status line.
/// Returns `false` if the seeder failed or panicked.
pub async fn run_seeder<S: Seeder + ?Sized>(seeder: &S, name: &str, db: &DatabaseConnection) -> bool {
    let base_msg = format!("Seeding {}", name.bold());
    let dots = ".".repeat(STATUS_COLUMN.saturating_sub(base_msg.len()));
    print!("{}{} ", base_msg, dots);
    let _ = io::stdout().flush();

    let start = Instant::now();
    match std::panic::AssertUnwindSafe(seeder.seed(db))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {
            let time_str = format!("({:.2?})", start.elapsed()).dimmed();
            println!("{} {}", "done".green(), time_str);
            true
        }
        Ok(Err(err)) => {
            println!("{}", "failed".red());
            log::error!("{name} seeder failed: {err}");
            false
        }
        Err(_) => {
            println!("{}", "panicked".red());
            false
        }
    }
}
