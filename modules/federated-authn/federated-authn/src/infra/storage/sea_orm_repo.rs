//! User directory backed by `SeaORM`.

use async_trait::async_trait;
use federated_authn_sdk::{
    AuthenticationMethod, DirectoryError, DirectoryTransaction, NewAuthenticationMethod, NewUser,
    RequestContext, User, UserDirectory,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QuerySelect, SqlErr,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::entity::{authentication_method, user, user_authentication_method};
use super::migrations::Migrator;

/// Map database errors to directory errors.
fn map_db_error(e: DbErr) -> DirectoryError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => return DirectoryError::Conflict(msg),
        Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
            return DirectoryError::Internal(format!("foreign key violation: {msg}"));
        }
        _ => {}
    }
    match e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
            DirectoryError::Unavailable(format!("database unavailable: {e}"))
        }
        other => DirectoryError::Internal(format!("database error: {other}")),
    }
}

async fn load_methods<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<AuthenticationMethod>, DbErr> {
    let methods = authentication_method::Entity::find()
        .inner_join(user_authentication_method::Entity)
        .filter(user_authentication_method::Column::UserId.eq(user_id))
        .all(conn)
        .await?;
    Ok(methods.into_iter().map(Into::into).collect())
}

/// User directory over a relational database.
#[derive(Clone)]
pub struct SeaOrmUserDirectory {
    db: DatabaseConnection,
}

impl SeaOrmUserDirectory {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect to `url` and apply pending migrations.
    ///
    /// `SQLite` in-memory databases are pinned to a single connection so every
    /// query sees the same schema.
    ///
    /// # Errors
    ///
    /// Returns a database error if the connection or a migration fails.
    pub async fn connect(url: &str) -> Result<Self, DbErr> {
        let mut opts = ConnectOptions::new(url.to_owned());
        if url.contains(":memory:") {
            opts.max_connections(1).min_connections(1);
        }
        opts.sqlx_logging(false);

        let db = Database::connect(opts).await?;
        Migrator::up(&db, None).await?;
        debug!("User directory schema is up to date");
        Ok(Self::new(db))
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl UserDirectory for SeaOrmUserDirectory {
    async fn find_by_identifier(
        &self,
        _ctx: &RequestContext,
        identifier: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let Some(row) = user::Entity::find()
            .filter(user::Column::Identifier.eq(identifier))
            .one(&self.db)
            .await
            .map_err(map_db_error)?
        else {
            return Ok(None);
        };

        let authentication_methods = load_methods(&self.db, row.id)
            .await
            .map_err(map_db_error)?;

        Ok(Some(User {
            id: row.id,
            identifier: row.identifier,
            verified: row.verified,
            authentication_methods,
            created_at: row.created_at,
        }))
    }

    async fn begin(
        &self,
        _ctx: &RequestContext,
    ) -> Result<Box<dyn DirectoryTransaction>, DirectoryError> {
        let txn = self.db.begin().await.map_err(map_db_error)?;
        Ok(Box::new(SeaOrmTransaction { txn }))
    }
}

/// Open database transaction. Dropping it without commit rolls back.
struct SeaOrmTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl DirectoryTransaction for SeaOrmTransaction {
    async fn save_authentication_method(
        &mut self,
        method: NewAuthenticationMethod,
    ) -> Result<AuthenticationMethod, DirectoryError> {
        let model = authentication_method::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            strategy: ActiveValue::Set(method.strategy),
            external_identifier: ActiveValue::Set(method.external_identifier),
        }
        .insert(&self.txn)
        .await
        .map_err(map_db_error)?;

        Ok(model.into())
    }

    async fn save_user(&mut self, new_user: NewUser) -> Result<User, DirectoryError> {
        let row = user::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            identifier: ActiveValue::Set(new_user.identifier),
            verified: ActiveValue::Set(new_user.verified),
            created_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        }
        .insert(&self.txn)
        .await
        .map_err(map_db_error)?;

        for method in &new_user.authentication_methods {
            user_authentication_method::Entity::insert(user_authentication_method::ActiveModel {
                user_id: ActiveValue::Set(row.id),
                authentication_method_id: ActiveValue::Set(method.id),
            })
            .exec_without_returning(&self.txn)
            .await
            .map_err(map_db_error)?;
        }

        Ok(User {
            id: row.id,
            identifier: row.identifier,
            verified: row.verified,
            authentication_methods: new_user.authentication_methods,
            created_at: row.created_at,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), DirectoryError> {
        self.txn.commit().await.map_err(map_db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DirectoryError> {
        self.txn.rollback().await.map_err(map_db_error)
    }
}
