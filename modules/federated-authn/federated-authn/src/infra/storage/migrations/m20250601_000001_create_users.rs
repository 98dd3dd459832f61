use sea_orm_migration::prelude as mig;
use sea_orm_migration::prelude::{DeriveIden, DeriveMigrationName};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Identifier,
    Verified,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthenticationMethods {
    Table,
    Id,
    Strategy,
    ExternalIdentifier,
}

#[derive(DeriveIden)]
enum UserAuthenticationMethods {
    Table,
    UserId,
    AuthenticationMethodId,
}

#[async_trait::async_trait]
impl mig::MigrationTrait for Migration {
    async fn up(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .create_table(
                mig::Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(Users::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        mig::ColumnDef::new(Users::Identifier)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(mig::ColumnDef::new(Users::Verified).boolean().not_null())
                    .col(
                        mig::ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(AuthenticationMethods::Table)
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(AuthenticationMethods::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        mig::ColumnDef::new(AuthenticationMethods::Strategy)
                            .string()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(AuthenticationMethods::ExternalIdentifier)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One method per (strategy, external identifier)
        manager
            .create_index(
                mig::Index::create()
                    .name("ux_authentication_methods_strategy_external_identifier")
                    .table(AuthenticationMethods::Table)
                    .col(AuthenticationMethods::Strategy)
                    .col(AuthenticationMethods::ExternalIdentifier)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                mig::Table::create()
                    .table(UserAuthenticationMethods::Table)
                    .if_not_exists()
                    .col(
                        mig::ColumnDef::new(UserAuthenticationMethods::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        mig::ColumnDef::new(UserAuthenticationMethods::AuthenticationMethodId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        mig::Index::create()
                            .col(UserAuthenticationMethods::UserId)
                            .col(UserAuthenticationMethods::AuthenticationMethodId),
                    )
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_user_authentication_methods_user")
                            .from(
                                UserAuthenticationMethods::Table,
                                UserAuthenticationMethods::UserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        mig::ForeignKey::create()
                            .name("fk_user_authentication_methods_method")
                            .from(
                                UserAuthenticationMethods::Table,
                                UserAuthenticationMethods::AuthenticationMethodId,
                            )
                            .to(AuthenticationMethods::Table, AuthenticationMethods::Id)
                            .on_delete(mig::ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &mig::SchemaManager) -> Result<(), mig::DbErr> {
        manager
            .drop_table(
                mig::Table::drop()
                    .table(UserAuthenticationMethods::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(mig::Table::drop().table(AuthenticationMethods::Table).to_owned())
            .await?;
        manager
            .drop_table(mig::Table::drop().table(Users::Table).to_owned())
            .await
    }
}
