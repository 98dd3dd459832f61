//! In-memory user directory.
//!
//! Used by tests and by embedded hosts without a database. Writes are staged
//! per transaction and applied atomically on commit; an uncommitted
//! transaction leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use federated_authn_sdk::{
    AuthenticationMethod, DirectoryError, DirectoryTransaction, NewAuthenticationMethod, NewUser,
    RequestContext, User, UserDirectory,
};
use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default)]
struct State {
    /// Users keyed by `identifier`.
    users: HashMap<String, User>,
    methods: Vec<AuthenticationMethod>,
    writes: usize,
}

impl State {
    fn method_exists(&self, method: &AuthenticationMethod) -> bool {
        self.methods.iter().any(|m| {
            m.strategy == method.strategy && m.external_identifier == method.external_identifier
        })
    }
}

/// Lock-based user directory with transactional provisioning.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<Mutex<State>>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a committed user directly, bypassing transactions.
    ///
    /// # Errors
    ///
    /// `Conflict` if a user with the same identifier exists.
    pub fn seed(&self, user: User) -> Result<(), DirectoryError> {
        let mut state = self.state.lock();
        if state.users.contains_key(&user.identifier) {
            return Err(DirectoryError::Conflict(format!(
                "user '{}' already exists",
                user.identifier
            )));
        }
        state
            .methods
            .extend(user.authentication_methods.iter().cloned());
        state.users.insert(user.identifier.clone(), user);
        Ok(())
    }

    /// Snapshot of committed users.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.state.lock().users.values().cloned().collect()
    }

    /// Snapshot of committed authentication methods.
    #[must_use]
    pub fn authentication_methods(&self) -> Vec<AuthenticationMethod> {
        self.state.lock().methods.clone()
    }

    /// Number of `save_*` calls made through transactions, committed or not.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_identifier(
        &self,
        _ctx: &RequestContext,
        identifier: &str,
    ) -> Result<Option<User>, DirectoryError> {
        Ok(self.state.lock().users.get(identifier).cloned())
    }

    async fn begin(
        &self,
        _ctx: &RequestContext,
    ) -> Result<Box<dyn DirectoryTransaction>, DirectoryError> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            methods: Vec::new(),
            users: Vec::new(),
        }))
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<State>>,
    methods: Vec<AuthenticationMethod>,
    users: Vec<User>,
}

#[async_trait]
impl DirectoryTransaction for InMemoryTransaction {
    async fn save_authentication_method(
        &mut self,
        method: NewAuthenticationMethod,
    ) -> Result<AuthenticationMethod, DirectoryError> {
        let method = AuthenticationMethod {
            id: Uuid::new_v4(),
            strategy: method.strategy,
            external_identifier: method.external_identifier,
        };

        {
            let mut state = self.state.lock();
            state.writes += 1;
            if state.method_exists(&method) {
                return Err(DirectoryError::Conflict(format!(
                    "authentication method '{}:{}' already exists",
                    method.strategy, method.external_identifier
                )));
            }
        }

        self.methods.push(method.clone());
        Ok(method)
    }

    async fn save_user(&mut self, user: NewUser) -> Result<User, DirectoryError> {
        {
            let mut state = self.state.lock();
            state.writes += 1;
            if state.users.contains_key(&user.identifier) {
                return Err(DirectoryError::Conflict(format!(
                    "user '{}' already exists",
                    user.identifier
                )));
            }
            let persisted = |id: Uuid| {
                self.methods.iter().any(|m| m.id == id) || state.methods.iter().any(|m| m.id == id)
            };
            if let Some(missing) = user
                .authentication_methods
                .iter()
                .find(|m| !persisted(m.id))
            {
                return Err(DirectoryError::Internal(format!(
                    "authentication method {} is not persisted",
                    missing.id
                )));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            identifier: user.identifier,
            verified: user.verified,
            authentication_methods: user.authentication_methods,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    async fn commit(self: Box<Self>) -> Result<(), DirectoryError> {
        let this = *self;
        let mut state = this.state.lock();

        // Validate everything first so a conflict applies nothing
        for user in &this.users {
            if state.users.contains_key(&user.identifier) {
                return Err(DirectoryError::Conflict(format!(
                    "user '{}' already exists",
                    user.identifier
                )));
            }
        }
        if let Some(dup) = this.methods.iter().find(|m| state.method_exists(m)) {
            return Err(DirectoryError::Conflict(format!(
                "authentication method '{}:{}' already exists",
                dup.strategy, dup.external_identifier
            )));
        }

        state.methods.extend(this.methods);
        for user in this.users {
            state.users.insert(user.identifier.clone(), user);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DirectoryError> {
        Ok(())
    }
}
