use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::QueryOrder;
use serde::Serialize;

/// A one-shot instruction queued for a device. `executed` only ever moves
/// from `false` to `true`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "commands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub device_id: i64,
    pub command_text: String,
    pub executed: bool,
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
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
        command_text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        let active_model = ActiveModel {
            device_id: Set(device_id),
            command_text: Set(command_text.to_owned()),
            executed: Set(false),
            created_at: Set(created_at),
            ..Default::default()
        };

        active_model.insert(db).await
    }

    /// Unexecuted commands for a device, oldest first.
    pub async fn find_pending<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Executed.eq(false))
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn latest_executed<C: ConnectionTrait>(
        db: &C,
        device_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::DeviceId.eq(device_id))
            .filter(Column::Executed.eq(true))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// Flags the given commands as executed. Already-executed rows are left alone.
    pub async fn mark_executed<C: ConnectionTrait>(db: &C, ids: Vec<i64>) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = Entity::update_many()
            .col_expr(Column::Executed, Expr::value(true))
            .filter(Column::Id.is_in(ids))
            .filter(Column::Executed.eq(false))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
