//! Tests for the federation service.
//!
//! The verifier runs over a stub backend and the directory is the in-memory
//! implementation, so every test observes exactly which writes happened.

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use federated_authn_sdk::{
        AuthOutcome, AuthenticationMethod, CredentialPayload, CredentialSource, DirectoryError,
        DirectoryTransaction, NewAuthenticationMethod, NewUser, RejectionReason, RequestContext,
        User, UserDirectory, VerificationBackend, VerificationBackendFactory, VerifierError,
    };
    use time::OffsetDateTime;
    use tracing_test::traced_test;
    use uuid::Uuid;

    use crate::domain::service::Service;
    use crate::domain::verifier::IdentityVerifier;
    use crate::infra::storage::InMemoryUserDirectory;

    /// Accepts `valid:<subject>`; `unavailable` simulates a provider outage.
    struct StubBackend;

    #[async_trait]
    impl VerificationBackend for StubBackend {
        async fn verify_token(&self, token: &str) -> Result<String, VerifierError> {
            if token == "unavailable" {
                return Err(VerifierError::ProviderUnavailable(
                    "connection refused".to_owned(),
                ));
            }
            token
                .strip_prefix("valid:")
                .map(ToOwned::to_owned)
                .ok_or_else(|| VerifierError::InvalidToken("signature mismatch".to_owned()))
        }
    }

    struct StubFactory;

    impl VerificationBackendFactory for StubFactory {
        fn connect(
            &self,
            _source: &CredentialSource,
        ) -> Result<Arc<dyn VerificationBackend>, VerifierError> {
            Ok(Arc::new(StubBackend))
        }
    }

    /// Directory whose transactions fail on `save_user`.
    struct FailingUserSave {
        inner: InMemoryUserDirectory,
    }

    #[async_trait]
    impl UserDirectory for FailingUserSave {
        async fn find_by_identifier(
            &self,
            ctx: &RequestContext,
            identifier: &str,
        ) -> Result<Option<User>, DirectoryError> {
            self.inner.find_by_identifier(ctx, identifier).await
        }

        async fn begin(
            &self,
            ctx: &RequestContext,
        ) -> Result<Box<dyn DirectoryTransaction>, DirectoryError> {
            Ok(Box::new(FailingTransaction {
                inner: self.inner.begin(ctx).await?,
            }))
        }
    }

    struct FailingTransaction {
        inner: Box<dyn DirectoryTransaction>,
    }

    #[async_trait]
    impl DirectoryTransaction for FailingTransaction {
        async fn save_authentication_method(
            &mut self,
            method: NewAuthenticationMethod,
        ) -> Result<AuthenticationMethod, DirectoryError> {
            self.inner.save_authentication_method(method).await
        }

        async fn save_user(&mut self, _user: NewUser) -> Result<User, DirectoryError> {
            Err(DirectoryError::Unavailable("disk full".to_owned()))
        }

        async fn commit(self: Box<Self>) -> Result<(), DirectoryError> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), DirectoryError> {
            self.inner.rollback().await
        }
    }

    fn verifier() -> Arc<IdentityVerifier> {
        let verifier = Arc::new(IdentityVerifier::new(Arc::new(StubFactory)));
        verifier.initialize(&CredentialSource::Ambient).unwrap();
        verifier
    }

    fn build_service(directory: Arc<dyn UserDirectory>, allow_registration: bool) -> Service {
        Service::new(
            "firebase".to_owned(),
            allow_registration,
            verifier(),
            directory,
        )
    }

    fn existing_user(subject: &str) -> User {
        User {
            id: Uuid::new_v4(),
            identifier: subject.to_owned(),
            verified: true,
            authentication_methods: vec![AuthenticationMethod {
                id: Uuid::new_v4(),
                strategy: "firebase".to_owned(),
                external_identifier: subject.to_owned(),
            }],
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn payload(token: &str, claimed: &str) -> CredentialPayload {
        CredentialPayload::new(token, claimed)
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[tokio::test]
    async fn invalid_token_is_rejected_without_writes() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), true);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("forged", "uid-1"))
            .await;

        assert_eq!(outcome, AuthOutcome::Rejected(RejectionReason::InvalidToken));
        assert_eq!(dir.write_count(), 0);
        assert!(dir.users().is_empty());
    }

    #[tokio::test]
    async fn subject_mismatch_is_rejected_even_for_valid_token() {
        let dir = InMemoryUserDirectory::new();
        dir.seed(existing_user("uid-2")).unwrap();
        let service = build_service(Arc::new(dir.clone()), true);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-2"))
            .await;

        assert_eq!(
            outcome,
            AuthOutcome::Rejected(RejectionReason::SubjectMismatch)
        );
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn unknown_subject_is_rejected_when_registration_disabled() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), false);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-1"))
            .await;

        assert_eq!(
            outcome,
            AuthOutcome::Rejected(RejectionReason::RegistrationDisabled)
        );
        assert_eq!(dir.write_count(), 0);
        assert!(dir.users().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn mismatch_logs_exactly_one_warning() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), true);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-7", "uid-9"))
            .await;

        assert!(outcome.into_user().is_none());
        assert_eq!(dir.write_count(), 0);
        logs_assert(|lines: &[&str]| {
            let warnings = lines.iter().filter(|l| l.contains("WARN")).count();
            if warnings == 1 {
                Ok(())
            } else {
                Err(format!("expected 1 warning, got {warnings}"))
            }
        });
    }

    // =========================================================================
    // Matching and provisioning
    // =========================================================================

    #[tokio::test]
    async fn existing_user_is_returned_without_writes() {
        let dir = InMemoryUserDirectory::new();
        let user = existing_user("uid-1");
        dir.seed(user.clone()).unwrap();
        let service = build_service(Arc::new(dir.clone()), true);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-1"))
            .await;

        assert_eq!(outcome, AuthOutcome::Authenticated(user));
        assert_eq!(dir.write_count(), 0);
    }

    #[tokio::test]
    async fn first_login_provisions_verified_user_with_linked_method() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), true);

        let user = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-42", "uid-42"))
            .await
            .into_user()
            .unwrap();

        assert_eq!(user.identifier, "uid-42");
        assert!(user.verified);
        assert_eq!(user.authentication_methods.len(), 1);
        let method = &user.authentication_methods[0];
        assert_eq!(method.strategy, "firebase");
        assert_eq!(method.external_identifier, "uid-42");

        assert_eq!(dir.users().len(), 1);
        assert_eq!(dir.authentication_methods(), vec![method.clone()]);
        assert_eq!(dir.write_count(), 2);
    }

    #[tokio::test]
    async fn second_login_returns_same_user_without_writes() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), true);
        let ctx = RequestContext::new();

        let first = service
            .authenticate(&ctx, &payload("valid:uid-1", "uid-1"))
            .await
            .into_user()
            .unwrap();
        let writes = dir.write_count();

        let second = service
            .authenticate(&ctx, &payload("valid:uid-1", "uid-1"))
            .await
            .into_user()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(dir.write_count(), writes);
        assert_eq!(dir.users().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_logins_converge_on_one_user() {
        let dir = InMemoryUserDirectory::new();
        let service = Arc::new(build_service(Arc::new(dir.clone()), true));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-1"))
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let user = handle.await.unwrap().into_user().unwrap();
            ids.push(user.id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(dir.users().len(), 1);
        assert_eq!(dir.authentication_methods().len(), 1);
    }

    // =========================================================================
    // Faults
    // =========================================================================

    #[tokio::test]
    async fn failed_user_save_rolls_back_method() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(
            Arc::new(FailingUserSave {
                inner: dir.clone(),
            }),
            true,
        );

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-1"))
            .await;

        assert!(matches!(outcome, AuthOutcome::SystemError(_)));
        assert!(dir.authentication_methods().is_empty());
        assert!(dir.users().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn provider_outage_fails_closed_and_logs_error() {
        let dir = InMemoryUserDirectory::new();
        let service = build_service(Arc::new(dir.clone()), true);

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("unavailable", "uid-1"))
            .await;

        assert!(matches!(outcome, AuthOutcome::SystemError(_)));
        assert_eq!(outcome.public_message(), "invalid credentials");
        assert_eq!(dir.write_count(), 0);
        assert!(logs_contain("ERROR"));
        assert!(!logs_contain("WARN"));
    }

    #[tokio::test]
    async fn uninitialized_verifier_fails_closed() {
        let dir = InMemoryUserDirectory::new();
        let service = Service::new(
            "firebase".to_owned(),
            true,
            Arc::new(IdentityVerifier::new(Arc::new(StubFactory))),
            Arc::new(dir.clone()),
        );

        let outcome = service
            .authenticate(&RequestContext::new(), &payload("valid:uid-1", "uid-1"))
            .await;

        assert!(matches!(outcome, AuthOutcome::SystemError(_)));
        assert_eq!(dir.write_count(), 0);
    }
}
