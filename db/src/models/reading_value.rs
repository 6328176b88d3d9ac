use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::metric_field;

/// One field's value within a reading, stored as text.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "reading_values")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub reading_id: i64,
    pub metric_field_id: i64,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reading::Entity",
        from = "Column::ReadingId",
        to = "super::reading::Column::Id",
        on_delete = "Cascade"
    )]
    Reading,
    #[sea_orm(
        belongs_to = "super::metric_field::Entity",
        from = "Column::MetricFieldId",
        to = "super::metric_field::Column::Id",
        on_delete = "Cascade"
    )]
    MetricField,
}

impl Related<super::reading::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reading.def()
    }
}

impl Related<super::metric_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetricField.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        reading_id: i64,
        metric_field_id: i64,
        value: &str,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            reading_id: Set(reading_id),
            metric_field_id: Set(metric_field_id),
            value: Set(value.to_owned()),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Values of the given readings joined with their field definitions,
    /// ordered by reading then field index.
    pub async fn find_with_fields<C: ConnectionTrait>(
        db: &C,
        reading_ids: Vec<i64>,
    ) -> Result<Vec<(Model, metric_field::Model)>, DbErr> {
        if reading_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Entity::find()
            .filter(Column::ReadingId.is_in(reading_ids))
            .find_also_related(metric_field::Entity)
            .order_by_asc(Column::ReadingId)
            .order_by_asc(metric_field::Column::FieldIndex)
            .all(db)
            .await?;

        // The foreign key guarantees a field for every value.
        Ok(rows
            .into_iter()
            .filter_map(|(value, field)| field.map(|f| (value, f)))
            .collect())
    }
}
