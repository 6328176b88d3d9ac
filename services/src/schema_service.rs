use std::collections::HashMap;

use db::models::metric_field::FieldType;
use db::models::{device, metric, metric_field};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub index: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSchema {
    pub name: String,
    pub metric_id: i64,
    pub fields: Vec<FieldSchema>,
}

/// Public view of a device and the schema it has grown so far. The guid is
/// a credential and is left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSchema {
    pub device: String,
    pub role: String,
    pub metrics: Vec<MetricSchema>,
}

pub struct SchemaService;

impl SchemaService {
    /// Every device with its metrics and their fields ordered by index.
    /// Devices that have not reported yet appear with no metrics.
    pub async fn schema(db: &DatabaseConnection) -> ServiceResult<Vec<DeviceSchema>> {
        let metrics = metric::Model::all(db).await?;
        let fields =
            metric_field::Model::find_for_metrics(db, metrics.iter().map(|m| m.id).collect())
                .await?;

        let mut fields_by_metric: HashMap<i64, Vec<FieldSchema>> = HashMap::new();
        for f in fields {
            fields_by_metric.entry(f.metric_id).or_default().push(FieldSchema {
                index: f.field_index,
                name: f.field_name,
                field_type: f.field_type,
            });
        }

        let mut metrics_by_device: HashMap<i64, Vec<MetricSchema>> = HashMap::new();
        for m in metrics {
            metrics_by_device.entry(m.device_id).or_default().push(MetricSchema {
                fields: fields_by_metric.remove(&m.id).unwrap_or_default(),
                name: m.name,
                metric_id: m.id,
            });
        }

        Ok(device::Model::all(db)
            .await?
            .into_iter()
            .map(|d| DeviceSchema {
                metrics: metrics_by_device.remove(&d.id).unwrap_or_default(),
                device: d.friendly_name,
                role: d.role,
            })
            .collect())
    }
}
