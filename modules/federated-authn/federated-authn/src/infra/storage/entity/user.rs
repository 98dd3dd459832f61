use sea_orm::entity::prelude::*;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub identifier: String,
    pub verified: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_authentication_method::Entity")]
    UserAuthenticationMethod,
}

impl Related<super::user_authentication_method::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserAuthenticationMethod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
