use crate::seed::{SeedFuture, Seeder};
use crate::seeds::device::DEVICES;
use db::models::device;
use sea_orm::DatabaseConnection;
use services::ingest_service::IngestService;
use services::payload::MetricSubmission;

const BATCHES: usize = 5;

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn between(low: f64, high: f64) -> f64 {
    one_decimal(low + fastrand::f64() * (high - low))
}

/// A representative batch for each collector role.
fn batch_for(role: &str) -> Vec<MetricSubmission> {
    match role {
        "Local-Metrics" => vec![
            MetricSubmission::new("Memory Usage").field("percentage", between(20.0, 90.0)),
            MetricSubmission::new("Process Count").field("count", fastrand::i64(150..400)),
        ],
        "OpenSky-ThirdParty" => {
            let callsigns = ["RYR12", "EIN3", "BAW77", "AAL209"];
            vec![
                MetricSubmission::new("Plane Count Ireland").field("count", fastrand::i64(20..120)),
                MetricSubmission::new("Closest Plane Limerick")
                    .field("closest_distance", between(0.5, 60.0))
                    .field("callsign", callsigns[fastrand::usize(..callsigns.len())])
                    .field("altitude", fastrand::i64(1_000..12_000)),
            ]
        }
        "Bitcoin-Collector" => vec![
            MetricSubmission::new("Bitcoin Metrics")
                .field("price", between(55_000.0, 70_000.0))
                .field("volume_24h", between(10.0, 40.0))
                .field("change_24h", between(-5.0, 5.0)),
        ],
        "ETH-Dominance-Collector" => vec![
            MetricSubmission::new("Ethereum Dominance").field("dominance", between(12.0, 20.0)),
        ],
        _ => Vec::new(),
    }
}

pub struct ReadingSeeder;

impl Seeder for ReadingSeeder {
    fn seed<'a>(&'a self, db: &'a DatabaseConnection) -> SeedFuture<'a> {
        Box::pin(async move {
            for (role, friendly_name) in DEVICES {
                let Some(dev) = device::Model::find_by_friendly_name(db, friendly_name).await? else {
                    continue;
                };
                for _ in 0..BATCHES {
                    IngestService::ingest_for_device(db, &dev, batch_for(role)).await;
                }
            }
            Ok(())
        })
    }
}
