//! Firebase-compatible verification backend.

pub mod backend;
pub mod credentials;
pub mod jwks;

pub use backend::{FirebaseBackendFactory, FirebaseTokenBackend};
pub use credentials::{FirebaseProject, resolve_project};
