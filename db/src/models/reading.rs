use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{PaginatorTrait, QueryOrder, Select};
use serde::Serialize;

/// One timestamped sample of a metric.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "readings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub metric_id: i64,
    pub timestamp: DateTime<Utc>,
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
        timestamp: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            metric_id: Set(metric_id),
            timestamp: Set(timestamp),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Newest first; readings sharing a timestamp are ordered by insertion,
    /// most recent first.
    fn newest_first(metric_id: i64) -> Select<Entity> {
        Entity::find()
            .filter(Column::MetricId.eq(metric_id))
            .order_by_desc(Column::Timestamp)
            .order_by_desc(Column::Id)
    }

    pub async fn latest_for_metric<C: ConnectionTrait>(
        db: &C,
        metric_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Self::newest_first(metric_id).one(db).await
    }

    /// One page of readings, newest first, plus the metric's total reading count.
    /// `page` is 1-based; a page past the end yields no items.
    pub async fn page_for_metric<C: ConnectionTrait>(
        db: &C,
        metric_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Model>, u64), DbErr> {
        let page_size = page_size.max(1);
        let paginator = Self::newest_first(metric_id).paginate(db, page_size);
        let total = paginator.num_items().await?;

        // The paginator multiplies page by size unchecked.
        let page_index = page.saturating_sub(1);
        match page_index.checked_mul(page_size) {
            Some(offset) if offset < total => Ok((paginator.fetch_page(page_index).await?, total)),
            _ => Ok((Vec::new(), total)),
        }
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
