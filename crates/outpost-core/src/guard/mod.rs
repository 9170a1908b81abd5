//! Navigation-time access control.
//!
//! Guards are pure functions of a session snapshot and the path the user
//! asked for. They cannot be constructed without a snapshot to evaluate, so
//! "guard invoked before a session exists" is unrepresentable rather than a
//! runtime condition. The routing layer re-evaluates the active route's
//! guard on every session change - a logout while protected content is on
//! screen must revoke access immediately, not at the next navigation.

use crate::auth::{SessionSnapshot, SessionStatus};

/// The destination a user attempted to reach when a guard denied access.
///
/// Carried as transient routing state so the sign-in flow can return the
/// user there afterwards. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    pub return_to: String,
}

impl NavigationIntent {
    pub fn new(return_to: impl Into<String>) -> Self {
        Self {
            return_to: return_to.into(),
        }
    }
}

/// What the routing layer should do with an attempted navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Render the requested content
    Allow,
    /// Session not yet settled: show a neutral pending indicator, do not
    /// redirect
    Pending,
    /// Send the user elsewhere, optionally remembering where they wanted
    /// to go
    Redirect {
        to: String,
        intent: Option<NavigationIntent>,
    },
}

/// A navigation-time check over the current session.
pub trait AccessGuard {
    fn evaluate(&self, session: &SessionSnapshot, requested_path: &str) -> GuardOutcome;
}

/// Restricts a route to authenticated users.
///
/// An unsettled session blocks without redirecting - treating `Unknown` as
/// a denial would flash the sign-in screen at an authenticated user on
/// every restart.
pub struct RequireAuthenticated {
    sign_in_path: String,
}

impl RequireAuthenticated {
    pub fn new(sign_in_path: impl Into<String>) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
        }
    }
}

impl AccessGuard for RequireAuthenticated {
    fn evaluate(&self, session: &SessionSnapshot, requested_path: &str) -> GuardOutcome {
        match session.status {
            SessionStatus::Unknown => GuardOutcome::Pending,
            SessionStatus::Authenticated => GuardOutcome::Allow,
            SessionStatus::Unauthenticated => GuardOutcome::Redirect {
                to: self.sign_in_path.clone(),
                intent: Some(NavigationIntent::new(requested_path)),
            },
        }
    }
}

/// Restricts a route to anonymous users (the sign-in screen).
///
/// No pending special case: showing public content to an unknown-status
/// user is harmless.
pub struct RequireAnonymous {
    authenticated_home: String,
}

impl RequireAnonymous {
    pub fn new(authenticated_home: impl Into<String>) -> Self {
        Self {
            authenticated_home: authenticated_home.into(),
        }
    }
}

impl AccessGuard for RequireAnonymous {
    fn evaluate(&self, session: &SessionSnapshot, _requested_path: &str) -> GuardOutcome {
        match session.status {
            SessionStatus::Authenticated => GuardOutcome::Redirect {
                to: self.authenticated_home.clone(),
                intent: None,
            },
            SessionStatus::Unknown | SessionStatus::Unauthenticated => GuardOutcome::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose, Engine as _};

    use crate::api::{ApiError, LoginSuccess};
    use crate::auth::session::AuthBackend;
    use crate::auth::{SessionManager, TokenStore};
    use crate::models::Identity;

    use super::*;

    fn snapshot(status: SessionStatus) -> SessionSnapshot {
        let identity = match status {
            SessionStatus::Authenticated => Some(Identity {
                id: "u-1".to_string(),
                email: "pat@example.com".to_string(),
                display_name: None,
            }),
            _ => None,
        };
        SessionSnapshot { status, identity }
    }

    #[test]
    fn test_authenticated_only_blocks_unknown_without_redirect() {
        let guard = RequireAuthenticated::new("/login");
        assert_eq!(
            guard.evaluate(&snapshot(SessionStatus::Unknown), "/templates"),
            GuardOutcome::Pending
        );
    }

    #[test]
    fn test_authenticated_only_denies_and_captures_intent() {
        let guard = RequireAuthenticated::new("/login");
        let outcome = guard.evaluate(&snapshot(SessionStatus::Unauthenticated), "/dashboard");
        assert_eq!(
            outcome,
            GuardOutcome::Redirect {
                to: "/login".to_string(),
                intent: Some(NavigationIntent::new("/dashboard")),
            }
        );
    }

    #[test]
    fn test_authenticated_only_allows_authenticated() {
        let guard = RequireAuthenticated::new("/login");
        assert_eq!(
            guard.evaluate(&snapshot(SessionStatus::Authenticated), "/templates"),
            GuardOutcome::Allow
        );
    }

    #[test]
    fn test_anonymous_only_redirects_authenticated_users_home() {
        let guard = RequireAnonymous::new("/templates");
        let outcome = guard.evaluate(&snapshot(SessionStatus::Authenticated), "/login");
        assert_eq!(
            outcome,
            GuardOutcome::Redirect {
                to: "/templates".to_string(),
                intent: None,
            }
        );
    }

    #[test]
    fn test_anonymous_only_allows_everyone_else() {
        let guard = RequireAnonymous::new("/templates");
        assert_eq!(
            guard.evaluate(&snapshot(SessionStatus::Unauthenticated), "/login"),
            GuardOutcome::Allow
        );
        assert_eq!(
            guard.evaluate(&snapshot(SessionStatus::Unknown), "/login"),
            GuardOutcome::Allow
        );
    }

    struct AcceptingBackend;

    impl AuthBackend for AcceptingBackend {
        async fn login(&self, email: &str, _password: &str) -> Result<LoginSuccess, ApiError> {
            let payload = format!(
                r#"{{"sub":"u-1","email":"{}","exp":{}}}"#,
                email,
                chrono::Utc::now().timestamp() + 3600
            );
            Ok(LoginSuccess {
                identity: Identity {
                    id: "u-1".to_string(),
                    email: email.to_string(),
                    display_name: None,
                },
                credential: format!("hdr.{}.sig", general_purpose::URL_SAFE_NO_PAD.encode(payload)),
            })
        }

        async fn confirm_identity(&self, _credential: &str) -> Result<Identity, ApiError> {
            Err(ApiError::ServerError("unused".to_string()))
        }
    }

    /// End to end: a denied navigation is resolved by logging in, and the
    /// captured intent brings the user back where they were headed.
    #[tokio::test]
    async fn test_denied_navigation_returns_after_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session =
            SessionManager::new(TokenStore::new(dir.path().to_path_buf()), AcceptingBackend);
        session.initialize().await;

        let guard = RequireAuthenticated::new("/login");
        let (to, intent) = match guard.evaluate(&session.snapshot(), "/dashboard") {
            GuardOutcome::Redirect { to, intent } => (to, intent),
            other => panic!("expected a redirect, got {other:?}"),
        };
        assert_eq!(to, "/login");
        let intent = intent.expect("denial must capture the destination");

        session
            .login("pat@example.com", "hunter2")
            .await
            .expect("login");

        // Guard re-evaluation now admits the user to the captured destination
        assert_eq!(
            guard.evaluate(&session.snapshot(), &intent.return_to),
            GuardOutcome::Allow
        );
        assert_eq!(intent.return_to, "/dashboard");
    }
}
