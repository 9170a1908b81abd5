//! Session state machine.
//!
//! Holds the client's authentication status and identity, and orchestrates
//! the token store and token validator. One instance exists per running
//! application; it is created `Unknown` at startup, settles exactly once via
//! `initialize`, and thereafter moves between `Authenticated` and
//! `Unauthenticated` through `login`/`logout`. Nothing resets it to
//! `Unknown` short of a process restart.
//!
//! Validation and storage failures are absorbed here and normalized into
//! state transitions; only login failures propagate, so the UI can show
//! them.

use tracing::{debug, info, warn};

use crate::api::{ApiError, LoginSuccess};
use crate::models::Identity;

use super::store::TokenStore;
use super::token;

/// Authentication status of the running client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not yet determined - `initialize` has not resolved. Guards must treat
    /// this as "block and wait", never as a denial.
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Read-only projection of the session for rendering components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub identity: Option<Identity>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Server half of the authentication exchange.
///
/// `ApiClient` implements this for production; tests supply a stub, so the
/// state machine's transitions can be exercised without a network.
pub trait AuthBackend {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<LoginSuccess, ApiError>>;

    fn confirm_identity(
        &self,
        credential: &str,
    ) -> impl std::future::Future<Output = Result<Identity, ApiError>>;
}

pub struct SessionManager<B: AuthBackend> {
    store: TokenStore,
    backend: B,
    status: SessionStatus,
    identity: Option<Identity>,
    credential: Option<String>,
    initialized: bool,
}

impl<B: AuthBackend> SessionManager<B> {
    pub fn new(store: TokenStore, backend: B) -> Self {
        Self {
            store,
            backend,
            status: SessionStatus::Unknown,
            identity: None,
            credential: None,
            initialized: false,
        }
    }

    /// Settle the session from the persisted credential record.
    ///
    /// Invoked once at application start; repeated calls return the settled
    /// snapshot without touching storage or the network again. Until this
    /// resolves the status stays `Unknown`.
    pub async fn initialize(&mut self) -> SessionSnapshot {
        if self.initialized {
            return self.snapshot();
        }
        self.initialized = true;

        let Some(credential) = self.store.load() else {
            debug!("No credential record, starting unauthenticated");
            self.set_unauthenticated();
            return self.snapshot();
        };

        if !token::is_valid(&credential) {
            debug!("Stored credential is malformed or expired, purging");
            self.purge_record();
            self.set_unauthenticated();
            return self.snapshot();
        }

        match self.backend.confirm_identity(&credential).await {
            Ok(identity) => {
                info!(email = %identity.email, "Session restored, identity confirmed");
                self.set_authenticated(identity, credential);
            }
            Err(e) if e.is_auth_rejection() => {
                info!("Server rejected stored credential, purging");
                self.purge_record();
                self.set_unauthenticated();
            }
            Err(e) => {
                // Server unreachable: trust the local expiry check and fall
                // back to the identity baked into the token claims.
                warn!(error = %e, "Identity confirmation unavailable, using token claims");
                let identity = Self::identity_from_claims(&credential);
                self.set_authenticated(identity, credential);
            }
        }

        self.snapshot()
    }

    /// Exchange credentials with the backend and establish the session.
    ///
    /// Performs at most one attempt; duplicate-submit prevention is the
    /// caller's responsibility. On failure the session is (or stays)
    /// unauthenticated, storage is untouched, and the error is returned for
    /// display - never swallowed.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<SessionSnapshot, ApiError> {
        match self.backend.login(email, password).await {
            Ok(LoginSuccess { identity, credential }) => {
                if let Err(e) = self.store.save(&credential) {
                    warn!(error = %e, "Failed to persist credential record");
                }
                info!(email = %identity.email, "Login successful");
                self.set_authenticated(identity, credential);
                Ok(self.snapshot())
            }
            Err(e) => {
                self.set_unauthenticated();
                Err(e)
            }
        }
    }

    /// Drop the session and purge the credential record. Idempotent.
    ///
    /// Navigating away from protected content afterwards is the caller's
    /// responsibility.
    pub fn logout(&mut self) {
        self.purge_record();
        self.set_unauthenticated();
        info!("Logged out");
    }

    /// Read-only projection for rendering components.
    pub fn snapshot(&self) -> SessionSnapshot {
        // Invariant: identity is present iff the session is authenticated
        debug_assert_eq!(
            self.identity.is_some(),
            self.status == SessionStatus::Authenticated
        );
        SessionSnapshot {
            status: self.status,
            identity: self.identity.clone(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The bearer credential of the current session, for wiring into API
    /// clients.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    fn set_authenticated(&mut self, identity: Identity, credential: String) {
        self.identity = Some(identity);
        self.credential = Some(credential);
        self.status = SessionStatus::Authenticated;
    }

    fn set_unauthenticated(&mut self) {
        self.identity = None;
        self.credential = None;
        self.status = SessionStatus::Unauthenticated;
    }

    fn purge_record(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove credential record");
        }
    }

    fn identity_from_claims(credential: &str) -> Identity {
        // Only called on a credential that already passed validation, so the
        // claims decode; the guard is for the impossible case anyway.
        let claims = token::decode_claims(credential);
        let (sub, email, name) = match claims {
            Some(c) => (c.sub, c.email, c.name),
            None => (None, None, None),
        };
        Identity {
            id: sub.unwrap_or_default(),
            email: email.unwrap_or_default(),
            display_name: name,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use base64::{engine::general_purpose, Engine as _};

    use super::*;

    fn make_token(exp: i64) -> String {
        let payload = format!(
            r#"{{"sub":"u-42","email":"pat@example.com","name":"Pat","exp":{}}}"#,
            exp
        );
        format!("hdr.{}.sig", general_purpose::URL_SAFE_NO_PAD.encode(payload))
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn server_identity() -> Identity {
        Identity {
            id: "u-42".to_string(),
            email: "pat@example.com".to_string(),
            display_name: Some("Pat".to_string()),
        }
    }

    /// Scripted backend behaviors for driving the state machine in tests
    enum ConfirmBehavior {
        Accept,
        RejectCredential,
        Unreachable,
    }

    struct StubBackend {
        accept_login: bool,
        confirm: ConfirmBehavior,
        confirm_calls: AtomicUsize,
    }

    impl StubBackend {
        fn new(accept_login: bool, confirm: ConfirmBehavior) -> Self {
            Self {
                accept_login,
                confirm,
                confirm_calls: AtomicUsize::new(0),
            }
        }
    }

    impl AuthBackend for StubBackend {
        async fn login(&self, email: &str, _password: &str) -> Result<LoginSuccess, ApiError> {
            if self.accept_login {
                Ok(LoginSuccess {
                    identity: Identity {
                        id: "u-42".to_string(),
                        email: email.to_string(),
                        display_name: Some("Pat".to_string()),
                    },
                    credential: make_token(far_future()),
                })
            } else {
                Err(ApiError::InvalidCredentials)
            }
        }

        async fn confirm_identity(&self, _credential: &str) -> Result<Identity, ApiError> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);
            match self.confirm {
                ConfirmBehavior::Accept => Ok(server_identity()),
                ConfirmBehavior::RejectCredential => Err(ApiError::Unauthorized),
                ConfirmBehavior::Unreachable => {
                    Err(ApiError::ServerError("connection refused".to_string()))
                }
            }
        }
    }

    fn manager_with(
        dir: &tempfile::TempDir,
        backend: StubBackend,
    ) -> SessionManager<StubBackend> {
        SessionManager::new(TokenStore::new(dir.path().to_path_buf()), backend)
    }

    #[tokio::test]
    async fn test_initialize_without_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));

        assert_eq!(session.status(), SessionStatus::Unknown);
        let snapshot = session.initialize().await;
        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(snapshot.identity.is_none());
    }

    #[tokio::test]
    async fn test_initialize_with_valid_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        let credential = make_token(far_future());
        store.save(&credential).expect("seed store");

        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        let snapshot = session.initialize().await;

        assert_eq!(snapshot.status, SessionStatus::Authenticated);
        assert_eq!(snapshot.identity, Some(server_identity()));
        // Credential survives a successful restore
        assert_eq!(store.load().as_deref(), Some(credential.as_str()));
        assert_eq!(session.credential(), Some(credential.as_str()));
    }

    #[tokio::test]
    async fn test_initialize_with_expired_record_purges_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store
            .save(&make_token(chrono::Utc::now().timestamp() - 60))
            .expect("seed store");

        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        let snapshot = session.initialize().await;

        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(snapshot.identity.is_none());
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_initialize_with_malformed_record_purges_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store.save("not-a-token").expect("seed store");

        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        let snapshot = session.initialize().await;

        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store.save(&make_token(far_future())).expect("seed store");

        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        let first = session.initialize().await;
        let second = session.initialize().await;

        assert_eq!(first, second);
        // The backend was consulted exactly once
        assert_eq!(session.backend.confirm_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_falls_back_to_claims_when_server_unreachable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store.save(&make_token(far_future())).expect("seed store");

        let mut session =
            manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Unreachable));
        let snapshot = session.initialize().await;

        assert_eq!(snapshot.status, SessionStatus::Authenticated);
        let identity = snapshot.identity.expect("identity from claims");
        assert_eq!(identity.id, "u-42");
        assert_eq!(identity.email, "pat@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Pat"));
        // The record is kept: the credential is still locally valid
        assert!(store.load().is_some());
    }

    #[tokio::test]
    async fn test_initialize_purges_record_the_server_rejects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        store.save(&make_token(far_future())).expect("seed store");

        let mut session =
            manager_with(&dir, StubBackend::new(true, ConfirmBehavior::RejectCredential));
        let snapshot = session.initialize().await;

        assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_login_success_persists_credential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        session.initialize().await;

        let snapshot = session
            .login("pat@example.com", "hunter2")
            .await
            .expect("login should succeed");

        assert_eq!(snapshot.status, SessionStatus::Authenticated);
        assert_eq!(
            snapshot.identity.expect("identity").email,
            "pat@example.com"
        );
        assert_eq!(store.load().as_deref(), session.credential());
    }

    #[tokio::test]
    async fn test_login_rejection_leaves_storage_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        let mut session = manager_with(&dir, StubBackend::new(false, ConfirmBehavior::Accept));
        session.initialize().await;

        let err = session
            .login("pat@example.com", "wrong")
            .await
            .expect_err("login should be rejected");

        assert!(matches!(err, ApiError::InvalidCredentials));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.identity().is_none());
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().to_path_buf());
        let mut session = manager_with(&dir, StubBackend::new(true, ConfirmBehavior::Accept));
        session.initialize().await;
        session
            .login("pat@example.com", "hunter2")
            .await
            .expect("login");
        assert!(store.load().is_some());

        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.identity().is_none());
        assert!(session.credential().is_none());
        assert!(store.load().is_none());

        // Logging out again is a no-op, not an error
        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }
}
