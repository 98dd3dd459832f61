pub mod error;
pub mod service;
pub mod verifier;

#[cfg(test)]
mod service_test;

pub use error::DomainError;
pub use service::Service;
pub use verifier::IdentityVerifier;
