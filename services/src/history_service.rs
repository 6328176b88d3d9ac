use chrono::{DateTime, Utc};
use common::config;
use db::models::reading;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::error::ServiceResult;
use crate::query_service::values_by_reading;
use crate::util::{OrderedFields, serialize_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub fields: OrderedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub metric_id: i64,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub page_count: u64,
    pub items: Vec<HistoryItem>,
}

/// Clamps caller paging input: pages start at 1, a zero page size means the
/// configured default, and sizes above the configured maximum are capped.
fn normalise_paging(page: u64, page_size: u64) -> (u64, u64) {
    let page_size = match page_size {
        0 => config::history_default_page_size(),
        n => n,
    };
    (page.max(1), page_size.min(config::history_max_page_size()))
}

pub struct HistoryService;

impl HistoryService {
    /// One page of a metric's readings, newest first.
    ///
    /// An unknown metric or a page past the end is an empty page, not an error.
    pub async fn history(
        db: &DatabaseConnection,
        metric_id: i64,
        page: u64,
        page_size: u64,
    ) -> ServiceResult<HistoryPage> {
        let (page, page_size) = normalise_paging(page, page_size);

        let (readings, total) =
            reading::Model::page_for_metric(db, metric_id, page, page_size).await?;
        let mut values = values_by_reading(db, readings.iter().map(|r| r.id).collect()).await?;

        let items = readings
            .into_iter()
            .map(|r| HistoryItem {
                timestamp: r.timestamp,
                fields: values.remove(&r.id).unwrap_or_default(),
            })
            .collect();

        Ok(HistoryPage {
            metric_id,
            page,
            page_size,
            total,
            page_count: total.div_ceil(page_size),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_service::{IngestOutcome, IngestService};
    use crate::payload::MetricSubmission;
    use chrono::{Duration, TimeZone};
    use db::models::metric_field::FieldType;
    use db::models::{device, metric, metric_field, reading_value};
    use db::test_utils::setup_test_db;

    async fn metric_with_readings(db: &DatabaseConnection, count: i64) -> i64 {
        let dev = device::Model::register(db, "Local-Metrics", "sensor1").await.unwrap();
        let m = metric::Model::create(db, dev.id, "Process Count").await.unwrap();
        let f = metric_field::Model::create(db, m.id, 1, "count", FieldType::Numeric)
            .await
            .unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        for i in 0..count {
            let r = reading::Model::create(db, m.id, t0 + Duration::minutes(i)).await.unwrap();
            reading_value::Model::create(db, r.id, f.id, &i.to_string()).await.unwrap();
        }
        m.id
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_but_counted() {
        let db = setup_test_db().await;
        let metric_id = metric_with_readings(&db, 1).await;

        let page = HistoryService::history(&db, metric_id, 2, 1).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page_count, 1);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn pages_are_newest_first_with_ceiling_page_count() {
        let db = setup_test_db().await;
        let metric_id = metric_with_readings(&db, 5).await;

        let first = HistoryService::history(&db, metric_id, 1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.page_count, 3);
        let counts: Vec<&str> = first
            .items
            .iter()
            .filter_map(|i| i.fields.get("count"))
            .collect();
        assert_eq!(counts, vec!["4", "3"]);

        let last = HistoryService::history(&db, metric_id, 3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].fields.get("count"), Some("0"));
        assert_eq!(
            serde_json::to_value(&last.items[0]).unwrap()["timestamp"],
            "2025-03-01 12:00:00"
        );
    }

    #[tokio::test]
    async fn far_out_of_range_page_is_an_empty_page() {
        let db = setup_test_db().await;
        let metric_id = metric_with_readings(&db, 3).await;

        let page = HistoryService::history(&db, metric_id, u64::MAX, 10).await.unwrap();
        assert_eq!(page.page, u64::MAX);
        assert_eq!(page.total, 3);
        assert_eq!(page.page_count, 1);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn unknown_metric_is_an_empty_page() {
        let db = setup_test_db().await;

        let page = HistoryService::history(&db, 9999, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.page_count, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn paging_input_is_normalised() {
        let db = setup_test_db().await;
        let metric_id = metric_with_readings(&db, 3).await;

        let page = HistoryService::history(&db, metric_id, 0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, config::history_default_page_size());
        assert_eq!(page.items.len(), 3);

        let capped = HistoryService::history(&db, metric_id, 1, u64::MAX).await.unwrap();
        assert_eq!(capped.page_size, config::history_max_page_size());
    }

    #[tokio::test]
    async fn sparse_history_items_carry_only_submitted_fields() {
        let db = setup_test_db().await;
        let dev = device::Model::register(&db, "Bitcoin-Collector", "btc").await.unwrap();

        let report = IngestService::ingest(
            &db,
            &dev.guid,
            vec![
                MetricSubmission::new("Bitcoin Metrics")
                    .field("price", 64000i64)
                    .field("volume", 12i64),
                MetricSubmission::new("Bitcoin Metrics").field("volume", 13i64),
            ],
        )
        .await
        .unwrap();
        let metric_id = match &report.outcomes[0] {
            IngestOutcome::Recorded(r) => r.metric_id,
            other => panic!("unexpected outcome {other:?}"),
        };

        let page = HistoryService::history(&db, metric_id, 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        let shapes: Vec<Vec<&str>> = page.items.iter().map(|i| i.fields.names()).collect();
        assert!(shapes.contains(&vec!["volume"]));
        assert!(shapes.contains(&vec!["price", "volume"]));
    }
}
