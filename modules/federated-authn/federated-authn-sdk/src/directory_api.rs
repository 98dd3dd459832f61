//! User directory contract.
//!
//! The directory owns user and authentication-method records. The strategy
//! only reads from it, except on provisioning where it writes one method and
//! one user inside a single transaction.

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::models::{AuthenticationMethod, NewAuthenticationMethod, NewUser, RequestContext, User};

/// Read access plus a transactional write scope over local users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the user whose `identifier` equals `identifier`.
    ///
    /// # Errors
    ///
    /// `Unavailable` or `Internal` if the store cannot be queried.
    async fn find_by_identifier(
        &self,
        ctx: &RequestContext,
        identifier: &str,
    ) -> Result<Option<User>, DirectoryError>;

    /// Open a write transaction scoped to `ctx`.
    ///
    /// # Errors
    ///
    /// `Unavailable` or `Internal` if the transaction cannot be started.
    async fn begin(
        &self,
        ctx: &RequestContext,
    ) -> Result<Box<dyn DirectoryTransaction>, DirectoryError>;
}

/// Write scope returned by [`UserDirectory::begin`].
///
/// Nothing saved through the transaction is visible to lookups until
/// [`commit`](DirectoryTransaction::commit) succeeds. Dropping the
/// transaction without committing discards every staged write.
#[async_trait]
pub trait DirectoryTransaction: Send {
    /// Persist an authentication method and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// `Conflict` if the method already exists, or a storage error.
    async fn save_authentication_method(
        &mut self,
        method: NewAuthenticationMethod,
    ) -> Result<AuthenticationMethod, DirectoryError>;

    /// Persist a user referencing already-saved methods.
    ///
    /// # Errors
    ///
    /// `Conflict` if a user with the same `identifier` exists, or a storage error.
    async fn save_user(&mut self, user: NewUser) -> Result<User, DirectoryError>;

    /// Make every staged write visible.
    ///
    /// # Errors
    ///
    /// `Conflict` if a concurrent writer committed the same identifier first,
    /// or a storage error. Nothing is persisted on error.
    async fn commit(self: Box<Self>) -> Result<(), DirectoryError>;

    /// Discard every staged write.
    ///
    /// # Errors
    ///
    /// A storage error if the rollback itself fails.
    async fn rollback(self: Box<Self>) -> Result<(), DirectoryError>;
}
