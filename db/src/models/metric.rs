use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A named measurement stream owned by one device. Created lazily the first
/// time a device submits an unseen name.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "metrics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id",
        on_delete = "Cascade"
    )]
    Device,
    #[sea_orm(has_many = "super::metric_field::Entity")]
    Fields,
    #[sea_orm(has_many = "super::reading::Entity")]
    Readings,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl Related<super::metric_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fields.def()
    }
}

impl Related<super::reading::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Readings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
        name: &str,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            device_id: Set(device_id),
            name: Set(name.to_owned()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_by_device_and_name<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
        name: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Name.eq(name))
            .one(db)
            .await
    }

    pub async fn find_for_device<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Every metric, ordered by owning device then creation order.
    pub async fn all<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .order_by_asc(Column::DeviceId)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device;
    use crate::test_utils::setup_test_db;
    use sea_orm::SqlErr;

    #[tokio::test]
    async fn names_are_unique_per_device_only() {
        let db = setup_test_db().await;
        let a = device::Model::register(&db, "Local-Metrics", "a").await.unwrap();
        let b = device::Model::register(&db, "Local-Metrics", "b").await.unwrap();

        Model::create(&db, a.id, "Memory Usage").await.unwrap();
        Model::create(&db, b.id, "Memory Usage").await.unwrap();

        let err = Model::create(&db, a.id, "Memory Usage").await.unwrap_err();
        assert!(matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));

        let found = Model::find_by_device_and_name(&db, b.id, "Memory Usage")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.device_id, b.id);
        assert_eq!(Model::find_for_device(&db, a.id).await.unwrap().len(), 1);
        assert_eq!(Model::all(&db).await.unwrap().len(), 2);
    }
}
