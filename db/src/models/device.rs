use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{QueryOrder, QuerySelect};
use serde::Serialize;
use uuid::Uuid;

/// A registered producer/consumer identity. Immutable after registration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Server-issued opaque identity handed back to the collector.
    #[sea_orm(unique)]
    pub guid: String,
    pub friendly_name: String,
    pub role: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::metric::Entity")]
    Metrics,
    #[sea_orm(has_many = "super::command::Entity")]
    Commands,
}

impl Related<super::metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Metrics.def()
    }
}

impl Related<super::command::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commands.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn register<C: ConnectionTrait>(
        db: &C,
        role: &str,
        friendly_name: &str,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            guid: Set(Uuid::new_v4().to_string()),
            friendly_name: Set(friendly_name.to_owned()),
            role: Set(role.to_owned()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    pub async fn find_by_guid<C: ConnectionTrait>(
        db: &C,
        guid: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find().filter(Column::Guid.eq(guid)).one(db).await
    }

    /// Looks a device up by its human label. Labels are not unique; the
    /// earliest registration wins.
    pub async fn find_by_friendly_name<C: ConnectionTrait>(
        db: &C,
        friendly_name: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::FriendlyName.eq(friendly_name))
            .order_by_asc(Column::Id)
            .one(db)
            .await
    }

    /// Re-reads the device row with `SELECT … FOR UPDATE`. Inside a
    /// transaction on an engine with row locks this serialises writers that
    /// act on the same device.
    ///
    /// SQLite has no row locks and sea-orm drops the clause there. On SQLite,
    /// writers are serialised because sea-orm's default SQLite pool holds a
    /// single connection, so a transaction owns the database until it ends.
    /// This call is then just a read that fails for a deleted device.
    pub async fn lock<C: ConnectionTrait>(db: &C, id: i64) -> Result<Model, DbErr> {
        Entity::find_by_id(id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Device {id} not found")))
    }

    pub async fn all<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, DbErr> {
        Entity::find().order_by_asc(Column::Id).all(db).await
    }

    /// Deletes the device; metrics, fields, readings, values and commands
    /// follow through `ON DELETE CASCADE`.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> Result<u64, DbErr> {
        let res = Entity::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected)
    }
}
