// ============================================================================
// MODEL : NOTIFICATIONS
// ============================================================================
//
// In-app notices addressed to one user:
//   - id (UUID, PRIMARY KEY)
//   - user_id (UUID, FK -> users.id, ON DELETE CASCADE)
//   - title / message (VARCHAR, NOT NULL)
//   - is_read (BOOLEAN, default FALSE)
//   - created_at (TIMESTAMPTZ)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notifications")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
