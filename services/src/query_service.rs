use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::{device, metric, reading, reading_value};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use serde::Serialize;

use crate::error::ServiceResult;
use crate::util::{OrderedFields, serialize_timestamp};

/// The most recent reading of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestMetric {
    pub device: String,
    #[serde(rename = "metric")]
    pub metric_name: String,
    pub metric_id: i64,
    pub fields: OrderedFields,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Stored values of each reading, keyed by reading id, in field index order.
pub(crate) async fn values_by_reading<C: ConnectionTrait>(
    db: &C,
    reading_ids: Vec<i64>,
) -> Result<HashMap<i64, OrderedFields>, DbErr> {
    let mut grouped: HashMap<i64, OrderedFields> = HashMap::new();
    for (value, field) in reading_value::Model::find_with_fields(db, reading_ids).await? {
        grouped
            .entry(value.reading_id)
            .or_default()
            .push(field.field_name, value.value);
    }
    Ok(grouped)
}

pub struct QueryService;

impl QueryService {
    /// Latest reading of every metric that has one, ordered by device then
    /// metric creation. Readings sharing a timestamp resolve to the one
    /// inserted last.
    pub async fn latest_snapshot(db: &DatabaseConnection) -> ServiceResult<Vec<LatestMetric>> {
        let devices: HashMap<i64, String> = device::Model::all(db)
            .await?
            .into_iter()
            .map(|d| (d.id, d.friendly_name))
            .collect();

        let mut latest = Vec::new();
        for m in metric::Model::all(db).await? {
            if let Some(r) = reading::Model::latest_for_metric(db, m.id).await? {
                latest.push((m, r));
            }
        }

        let mut values =
            values_by_reading(db, latest.iter().map(|(_, r)| r.id).collect()).await?;

        Ok(latest
            .into_iter()
            .map(|(m, r)| LatestMetric {
                device: devices.get(&m.device_id).cloned().unwrap_or_default(),
                metric_name: m.name,
                metric_id: m.id,
                fields: values.remove(&r.id).unwrap_or_default(),
                timestamp: r.timestamp,
            })
            .collect())
    }
}
