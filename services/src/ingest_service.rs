use chrono::Utc;
use common::config;
use db::models::metric_field::{FieldType, MAX_FIELDS_PER_METRIC};
use db::models::{device, metric, metric_field, reading, reading_value};
use log::{debug, error, info, warn};
use sea_orm::{DatabaseConnection, DbErr, SqlErr, TransactionTrait};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult, SubmissionError};
use crate::payload::{FieldList, IngestPayload, MetricSubmission, RawIngestPayload};

/// What happened to one submission of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Recorded(RecordedReading),
    Skipped { reason: SubmissionError },
    Failed { metric: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedReading {
    pub metric: String,
    pub metric_id: i64,
    pub reading_id: i64,
    pub created_metric: bool,
    /// Field names defined by this submission, in index order.
    pub new_fields: Vec<String>,
    /// New field names that did not fit into the metric's schema.
    pub dropped_fields: Vec<String>,
    pub values_written: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub device: String,
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn recorded(&self) -> impl Iterator<Item = &RecordedReading> {
        self.outcomes.iter().filter_map(|o| match o {
            IngestOutcome::Recorded(r) => Some(r),
            _ => None,
        })
    }

    pub fn recorded_count(&self) -> usize {
        self.recorded().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Failed { .. }))
            .count()
    }
}

/// Field additions for one submission against a metric's current schema.
#[derive(Debug, Default, PartialEq)]
struct FieldPlan {
    additions: Vec<(i32, String, FieldType)>,
    dropped: Vec<String>,
}

/// New names take the next free indices in submission order until the metric
/// holds `MAX_FIELDS_PER_METRIC` fields; the rest are dropped.
fn plan_new_fields(defined: &[metric_field::Model], fields: &FieldList) -> FieldPlan {
    let mut next_index = defined.iter().map(|f| f.field_index).max().unwrap_or(0) + 1;
    let mut plan = FieldPlan::default();

    for (name, value) in fields.iter() {
        if defined.iter().any(|f| f.field_name == name) {
            continue;
        }
        if next_index <= MAX_FIELDS_PER_METRIC {
            plan.additions
                .push((next_index, name.to_owned(), value.inferred_type()));
            next_index += 1;
        } else {
            plan.dropped.push(name.to_owned());
        }
    }

    plan
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub struct IngestService;

impl IngestService {
    /// Ingests a batch for the device identified by `device_guid`.
    ///
    /// # Errors
    /// `DeviceNotFound` for an unknown guid. Problems with individual
    /// submissions are reported per item in the returned [`IngestReport`].
    pub async fn ingest(
        db: &DatabaseConnection,
        device_guid: &str,
        submissions: Vec<MetricSubmission>,
    ) -> ServiceResult<IngestReport> {
        let device = Self::find_device(db, device_guid).await?;
        Ok(Self::ingest_for_device(db, &device, submissions).await)
    }

    async fn find_device(db: &DatabaseConnection, device_guid: &str) -> ServiceResult<device::Model> {
        device::Model::find_by_guid(db, device_guid)
            .await?
            .ok_or_else(|| ServiceError::DeviceNotFound(device_guid.to_owned()))
    }

    pub async fn ingest_payload(
        db: &DatabaseConnection,
        payload: IngestPayload,
    ) -> ServiceResult<IngestReport> {
        Self::ingest(db, &payload.device_guid, payload.metrics).await
    }

    /// Decodes a JSON request body and ingests it.
    ///
    /// Only the envelope must decode for the call to succeed. Each metric
    /// item is decoded on its own, and one that does not decode is reported
    /// as a `Malformed` skip while its siblings are still recorded.
    pub async fn ingest_json(db: &DatabaseConnection, body: &str) -> ServiceResult<IngestReport> {
        let raw: RawIngestPayload = serde_json::from_str(body)?;
        let device = Self::find_device(db, &raw.device_guid).await?;
        Ok(Self::ingest_items(db, &device, raw.into_items()).await)
    }

    /// Applies each submission in order. A failing or malformed item never
    /// prevents its siblings from being recorded.
    pub async fn ingest_for_device(
        db: &DatabaseConnection,
        device: &device::Model,
        submissions: Vec<MetricSubmission>,
    ) -> IngestReport {
        Self::ingest_items(db, device, submissions.into_iter().map(Ok).collect()).await
    }

    async fn ingest_items(
        db: &DatabaseConnection,
        device: &device::Model,
        items: Vec<Result<MetricSubmission, SubmissionError>>,
    ) -> IngestReport {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = match item {
                Ok(submission) => Self::ingest_one(db, device, &submission).await,
                Err(reason) => Self::skip(device, reason),
            };
            outcomes.push(outcome);
        }

        let report = IngestReport {
            device: device.friendly_name.clone(),
            outcomes,
        };
        info!(
            "Ingested batch for '{}': {} recorded, {} skipped, {} failed",
            report.device,
            report.recorded_count(),
            report.skipped_count(),
            report.failed_count()
        );
        report
    }

    async fn ingest_one(
        db: &DatabaseConnection,
        device: &device::Model,
        submission: &MetricSubmission,
    ) -> IngestOutcome {
        let name = match submission.validate() {
            Ok(name) => name,
            Err(reason) => return Self::skip(device, reason),
        };

        let max_attempts = config::ingest_max_attempts();
        let mut attempt = 1;
        loop {
            match Self::apply_submission(db, device.id, name, &submission.fields).await {
                Ok(recorded) => return IngestOutcome::Recorded(recorded),
                Err(err) if attempt < max_attempts && is_unique_violation(&err) => {
                    warn!(
                        "Schema conflict on metric '{name}' for '{}' (attempt {attempt}/{max_attempts}), retrying: {err}",
                        device.friendly_name
                    );
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "Failed to ingest metric '{name}' for '{}': {err}",
                        device.friendly_name
                    );
                    return IngestOutcome::Failed {
                        metric: name.to_owned(),
                        error: err.to_string(),
                    };
                }
            }
        }
    }

    fn skip(device: &device::Model, reason: SubmissionError) -> IngestOutcome {
        warn!("Skipping submission from '{}': {reason}", device.friendly_name);
        IngestOutcome::Skipped { reason }
    }

    /// Resolves or creates the metric, extends its schema, and appends one
    /// reading with its values, all inside one transaction. The device row
    /// lock taken first serialises concurrent writers for the same device.
    async fn apply_submission(
        db: &DatabaseConnection,
        device_id: i64,
        name: &str,
        fields: &FieldList,
    ) -> Result<RecordedReading, DbErr> {
        let txn = db.begin().await?;
        device::Model::lock(&txn, device_id).await?;

        let (metric, created_metric) =
            match metric::Model::find_by_device_and_name(&txn, device_id, name).await? {
                Some(existing) => (existing, false),
                None => (metric::Model::create(&txn, device_id, name).await?, true),
            };
        if created_metric {
            info!("Created metric '{name}' (id {}) for device {device_id}", metric.id);
        }

        let mut defined = metric_field::Model::find_for_metric(&txn, metric.id).await?;
        let plan = plan_new_fields(&defined, fields);

        let mut new_fields = Vec::with_capacity(plan.additions.len());
        for (index, field_name, field_type) in plan.additions {
            debug!("Metric '{name}': field {index} = '{field_name}' ({field_type})");
            let field =
                metric_field::Model::create(&txn, metric.id, index, &field_name, field_type)
                    .await?;
            new_fields.push(field_name);
            defined.push(field);
        }
        if !plan.dropped.is_empty() {
            warn!(
                "Metric '{name}' is at its {MAX_FIELDS_PER_METRIC}-field limit; dropped {:?}",
                plan.dropped
            );
        }

        let reading = reading::Model::create(&txn, metric.id, Utc::now()).await?;

        let mut values_written = 0;
        for field in &defined {
            if let Some(value) = fields.get(&field.field_name) {
                reading_value::Model::create(&txn, reading.id, field.id, &value.render()).await?;
                values_written += 1;
            }
        }

        txn.commit().await?;

        Ok(RecordedReading {
            metric: name.to_owned(),
            metric_id: metric.id,
            reading_id: reading.id,
            created_metric,
            new_fields,
            dropped_fields: plan.dropped,
            values_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::{setup_test_db, setup_test_db_with_device};

    fn defined_field(index: i32, name: &str) -> metric_field::Model {
        metric_field::Model {
            id: index as i64,
            metric_id: 1,
            field_index: index,
            field_name: name.to_owned(),
            field_type: FieldType::Numeric,
        }
    }

    fn recorded(outcome: &IngestOutcome) -> &RecordedReading {
        match outcome {
            IngestOutcome::Recorded(r) => r,
            other => panic!("expected a recorded reading, got {other:?}"),
        }
    }

    #[test]
    fn plan_assigns_next_indices_and_drops_past_capacity() {
        let defined = vec![defined_field(1, "percentage")];
        let fields: FieldList = [
            ("percentage", 50i64),
            ("extra1", 1),
            ("extra2", 2),
            ("extra3", 3),
            ("extra4", 4),
            ("extra5", 5),
        ]
        .into_iter()
        .collect();

        let plan = plan_new_fields(&defined, &fields);
        let indices: Vec<(i32, &str)> = plan
            .additions
            .iter()
            .map(|(i, n, _)| (*i, n.as_str()))
            .collect();
        assert_eq!(
            indices,
            vec![(2, "extra1"), (3, "extra2"), (4, "extra3"), (5, "extra4")]
        );
        assert_eq!(plan.dropped, vec!["extra5".to_string()]);
    }

    #[test]
    fn plan_infers_types_from_values() {
        let fields = MetricSubmission::new("Bitcoin Metrics")
            .field("price", 64000.5)
            .field("symbol", "BTC")
            .fields;
        let plan = plan_new_fields(&[], &fields);
        assert_eq!(
            plan.additions,
            vec![
                (1, "price".to_string(), FieldType::Numeric),
                (2, "symbol".to_string(), FieldType::Text)
            ]
        );
        assert!(plan.dropped.is_empty());
    }

    #[tokio::test]
    async fn first_submission_creates_metric_fields_and_values() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let report = IngestService::ingest(
            &db,
            &dev.guid,
            vec![MetricSubmission::new("Memory Usage").field("percentage", 42.5)],
        )
        .await
        .unwrap();

        assert_eq!(report.device, "sensor1");
        let r = recorded(&report.outcomes[0]);
        assert!(r.created_metric);
        assert_eq!(r.new_fields, vec!["percentage".to_string()]);
        assert_eq!(r.values_written, 1);

        let fields = metric_field::Model::find_for_metric(&db, r.metric_id).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_index, 1);
        assert_eq!(fields[0].field_type, FieldType::Numeric);

        let values = reading_value::Model::find_with_fields(&db, vec![r.reading_id])
            .await
            .unwrap();
        assert_eq!(values[0].0.value, "42.5");
    }

    #[tokio::test]
    async fn capacity_is_five_and_excess_names_are_dropped_silently() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        IngestService::ingest(
            &db,
            &dev.guid,
            vec![MetricSubmission::new("Memory Usage").field("percentage", 42.5)],
        )
        .await
        .unwrap();

        let report = IngestService::ingest(
            &db,
            &dev.guid,
            vec![
                MetricSubmission::new("Memory Usage")
                    .field("percentage", 50i64)
                    .field("extra1", 1i64)
                    .field("extra2", 2i64)
                    .field("extra3", 3i64)
                    .field("extra4", 4i64)
                    .field("extra5", 5i64),
            ],
        )
        .await
        .unwrap();

        let r = recorded(&report.outcomes[0]);
        assert!(!r.created_metric);
        assert_eq!(r.new_fields, vec!["extra1", "extra2", "extra3", "extra4"]);
        assert_eq!(r.dropped_fields, vec!["extra5"]);
        assert_eq!(r.values_written, 5);

        let fields = metric_field::Model::find_for_metric(&db, r.metric_id).await.unwrap();
        let layout: Vec<(i32, &str)> = fields
            .iter()
            .map(|f| (f.field_index, f.field_name.as_str()))
            .collect();
        assert_eq!(
            layout,
            vec![
                (1, "percentage"),
                (2, "extra1"),
                (3, "extra2"),
                (4, "extra3"),
                (5, "extra4")
            ]
        );

        // A full schema stays full.
        let again = IngestService::ingest(
            &db,
            &dev.guid,
            vec![MetricSubmission::new("Memory Usage").field("extra6", 6i64)],
        )
        .await
        .unwrap();
        let r = recorded(&again.outcomes[0]);
        assert_eq!(r.dropped_fields, vec!["extra6"]);
        assert_eq!(r.values_written, 0);
        assert_eq!(
            metric_field::Model::count_for_metric(&db, r.metric_id).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn seven_fields_on_a_new_metric_keep_the_first_five() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let submission = (1..=7i64).fold(MetricSubmission::new("Disk Usage"), |s, i| {
            s.field(format!("f{i}"), i)
        });
        let report = IngestService::ingest(&db, &dev.guid, vec![submission])
            .await
            .unwrap();

        let r = recorded(&report.outcomes[0]);
        assert!(r.created_metric);
        assert_eq!(r.new_fields, vec!["f1", "f2", "f3", "f4", "f5"]);
        assert_eq!(r.dropped_fields, vec!["f6", "f7"]);
        assert_eq!(r.values_written, 5);

        let fields = metric_field::Model::find_for_metric(&db, r.metric_id).await.unwrap();
        let layout: Vec<(i32, &str)> = fields
            .iter()
            .map(|f| (f.field_index, f.field_name.as_str()))
            .collect();
        assert_eq!(
            layout,
            vec![(1, "f1"), (2, "f2"), (3, "f3"), (4, "f4"), (5, "f5")]
        );
        assert_eq!(
            metric_field::Model::count_for_metric(&db, r.metric_id).await.unwrap(),
            5
        );

        let values = reading_value::Model::find_with_fields(&db, vec![r.reading_id])
            .await
            .unwrap();
        assert_eq!(values.len(), 5);
        assert!(values.iter().all(|(_, f)| f.field_index <= MAX_FIELDS_PER_METRIC));
    }

    #[tokio::test]
    async fn indices_are_stable_under_reordered_resubmission() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let first = IngestService::ingest(
            &db,
            &dev.guid,
            vec![
                MetricSubmission::new("Closest Plane Limerick")
                    .field("closest_distance", 14.2)
                    .field("callsign", "RYR12"),
            ],
        )
        .await
        .unwrap();
        let metric_id = recorded(&first.outcomes[0]).metric_id;

        IngestService::ingest(
            &db,
            &dev.guid,
            vec![
                MetricSubmission::new("Closest Plane Limerick")
                    .field("altitude", 9000i64)
                    .field("callsign", "EIN3")
                    .field("closest_distance", 3.1),
            ],
        )
        .await
        .unwrap();

        let fields = metric_field::Model::find_for_metric(&db, metric_id).await.unwrap();
        let layout: Vec<(i32, &str, FieldType)> = fields
            .iter()
            .map(|f| (f.field_index, f.field_name.as_str(), f.field_type))
            .collect();
        assert_eq!(
            layout,
            vec![
                (1, "closest_distance", FieldType::Numeric),
                (2, "callsign", FieldType::Text),
                (3, "altitude", FieldType::Numeric)
            ]
        );
    }

    #[tokio::test]
    async fn readings_are_sparse_and_always_created() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        IngestService::ingest(
            &db,
            &dev.guid,
            vec![
                MetricSubmission::new("Bitcoin Metrics")
                    .field("price", 64000i64)
                    .field("volume", 12i64),
            ],
        )
        .await
        .unwrap();

        let report = IngestService::ingest(
            &db,
            &dev.guid,
            vec![MetricSubmission::new("Bitcoin Metrics").field("volume", 13i64)],
        )
        .await
        .unwrap();
        let r = recorded(&report.outcomes[0]);
        assert_eq!(r.values_written, 1);

        let values = reading_value::Model::find_with_fields(&db, vec![r.reading_id])
            .await
            .unwrap();
        let stored: Vec<(&str, &str)> = values
            .iter()
            .map(|(v, f)| (f.field_name.as_str(), v.value.as_str()))
            .collect();
        assert_eq!(stored, vec![("volume", "13")]);
        assert_eq!(
            reading::Model::count_for_metric(&db, r.metric_id).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn malformed_items_are_skipped_without_aborting_the_batch() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let report = IngestService::ingest_json(
            &db,
            &format!(
                r#"{{"device_guid": "{}", "metrics": [
                    {{"fields": {{"a": 1}}}},
                    {{"name": "Process Count", "fields": [["count", 311]]}},
                    {{"name": "Empty", "fields": {{}}}}
                ]}}"#,
                dev.guid
            ),
        )
        .await
        .unwrap();

        assert_eq!(report.recorded_count(), 1);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(
            report.outcomes[0],
            IngestOutcome::Skipped {
                reason: SubmissionError::MissingName
            }
        );
        assert_eq!(
            report.outcomes[2],
            IngestOutcome::Skipped {
                reason: SubmissionError::EmptyFields("Empty".into())
            }
        );

        let metrics = metric::Model::find_for_device(&db, dev.id).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "Process Count");
    }

    #[tokio::test]
    async fn undecodable_items_are_isolated_from_their_batch() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let report = IngestService::ingest_json(
            &db,
            &format!(
                r#"{{"device_guid": "{}", "metrics": [
                    {{"name": "Memory Usage", "fields": {{"percentage": 42.5}}}},
                    {{"name": "Broken", "fields": {{"flag": [1]}}}},
                    {{"name": "Nulls", "fields": {{"flag": null}}}},
                    {{"name": 12, "fields": {{"a": 1}}}},
                    {{"name": "Service State", "fields": [["running", true]]}}
                ]}}"#,
                dev.guid
            ),
        )
        .await
        .unwrap();

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.recorded_count(), 2);
        assert_eq!(report.skipped_count(), 3);
        for outcome in &report.outcomes[1..4] {
            assert!(
                matches!(
                    outcome,
                    IngestOutcome::Skipped {
                        reason: SubmissionError::Malformed(_)
                    }
                ),
                "{outcome:?}"
            );
        }

        let state = recorded(&report.outcomes[4]);
        let values = reading_value::Model::find_with_fields(&db, vec![state.reading_id])
            .await
            .unwrap();
        assert_eq!(values[0].0.value, "true");
        assert_eq!(values[0].1.field_type, FieldType::Text);

        let mut names: Vec<String> = metric::Model::find_for_device(&db, dev.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Memory Usage", "Service State"]);
    }

    #[tokio::test]
    async fn unknown_device_and_bad_json_are_call_errors() {
        let db = setup_test_db().await;

        let err = IngestService::ingest(&db, "no-such-guid", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DeviceNotFound(ref g) if g == "no-such-guid"));

        let err = IngestService::ingest_json(&db, "{not json").await.unwrap_err();
        assert!(matches!(err, ServiceError::Payload(_)));
    }

    // The in-memory SQLite pool has one connection, so the tasks' transactions
    // run one after another. This checks the result is consistent, not row locking.
    #[tokio::test]
    async fn concurrent_producers_agree_on_one_schema() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;

        let tasks: Vec<_> = (0..8i64)
            .map(|i| {
                let db = db.clone();
                let guid = dev.guid.clone();
                tokio::spawn(async move {
                    let submission = if i % 2 == 0 {
                        MetricSubmission::new("ETH Dominance")
                            .field("dominance", i)
                            .field("rank", 2i64)
                    } else {
                        MetricSubmission::new("ETH Dominance")
                            .field("rank", 2i64)
                            .field("dominance", i)
                    };
                    IngestService::ingest(&db, &guid, vec![submission]).await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            let report = result.unwrap().unwrap();
            assert_eq!(report.failed_count(), 0);
        }

        let metrics = metric::Model::find_for_device(&db, dev.id).await.unwrap();
        assert_eq!(metrics.len(), 1);
        let fields = metric_field::Model::find_for_metric(&db, metrics[0].id).await.unwrap();
        let indices: Vec<i32> = fields.iter().map(|f| f.field_index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(
            reading::Model::count_for_metric(&db, metrics[0].id).await.unwrap(),
            8
        );
    }

    #[tokio::test]
    async fn duplicate_inserts_are_classified_as_retryable() {
        let (db, dev) = setup_test_db_with_device("Local-Metrics", "sensor1").await;
        metric::Model::create(&db, dev.id, "Memory Usage").await.unwrap();

        let err = metric::Model::create(&db, dev.id, "Memory Usage")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&DbErr::RecordNotFound("x".into())));
    }

    #[test]
    fn outcomes_serialise_with_a_status_tag() {
        let skipped = IngestOutcome::Skipped {
            reason: SubmissionError::EmptyFields("m".into()),
        };
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            serde_json::json!({"status": "skipped", "reason": {"kind": "empty_fields", "detail": "m"}})
        );
        let nameless = IngestOutcome::Skipped {
            reason: SubmissionError::MissingName,
        };
        assert_eq!(
            serde_json::to_value(&nameless).unwrap(),
            serde_json::json!({"status": "skipped", "reason": {"kind": "missing_name"}})
        );
    }
}
