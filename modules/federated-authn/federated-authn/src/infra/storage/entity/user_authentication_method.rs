//! Link table between users and their authentication methods.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_authentication_methods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub authentication_method_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::authentication_method::Entity",
        from = "Column::AuthenticationMethodId",
        to = "super::authentication_method::Column::Id"
    )]
    AuthenticationMethod,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::authentication_method::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthenticationMethod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
