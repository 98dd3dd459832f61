use federated_authn_sdk::AuthenticationMethod;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "authentication_methods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub strategy: String,
    pub external_identifier: String,
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

impl From<Model> for AuthenticationMethod {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            strategy: m.strategy,
            external_identifier: m.external_identifier,
        }
    }
}
