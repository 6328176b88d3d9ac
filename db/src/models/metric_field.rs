use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, PaginatorTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Upper bound on the number of fields a metric may ever define.
pub const MAX_FIELDS_PER_METRIC: i32 = 5;

/// One named, typed column of a metric's schema at a fixed 1-based index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "metric_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub metric_id: i64,
    pub field_index: i32,
    pub field_name: String,
    pub field_type: FieldType,
}

/// Decided once, from the first value seen for the field, and never revisited.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FieldType {
    #[sea_orm(string_value = "numeric")]
    Numeric,

    #[serde(rename = "string")]
    #[strum(to_string = "string")]
    #[sea_orm(string_value = "string")]
    Text,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::metric::Entity",
        from = "Column::MetricId",
        to = "super::metric::Column::Id",
        on_delete = "Cascade"
    )]
    Metric,
    #[sea_orm(has_many = "super::reading_value::Entity")]
    Values,
}

impl Related<super::metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Metric.def()
    }
}

impl Related<super::reading_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Values.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        metric_id: i64,
        field_index: i32,
        field_name: &str,
        field_type: FieldType,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            metric_id: Set(metric_id),
            field_index: Set(field_index),
            field_name: Set(field_name.to_owned()),
            field_type: Set(field_type),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Field definitions of a metric, ordered by index.
    pub async fn find_for_metric<C: ConnectionTrait>(
        db: &C,
        metric_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::MetricId.eq(metric_id))
            .order_by_asc(Column::FieldIndex)
            .all(db)
            .await
    }

    /// Field definitions for several metrics at once, ordered by metric then index.
    pub async fn find_for_metrics<C: ConnectionTrait>(
        db: &C,
        metric_ids: Vec<i64>,
    ) -> Result<Vec<Model>, DbErr> {
        if metric_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::MetricId.is_in(metric_ids))
            .order_by_asc(Column::MetricId)
            .order_by_asc(Column::FieldIndex)
            .all(db)
            .await
    }

    pub async fn count_for_metric<C: ConnectionTrait>(
        db: &C,
        metric_id: i64,
    ) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::MetricId.eq(metric_id))
            .count(db)
            .await
    }
}
