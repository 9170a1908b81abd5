//! Authentication module: session lifecycle, credential persistence, and
//! token validation.
//!
//! This module provides:
//! - `SessionManager`: the session state machine (initialize/login/logout)
//! - `TokenStore`: durable persistence of the credential record
//! - `token`: structural and expiry validation of the bearer credential
//! - `CredentialStore`: OS-keychain storage for the remember-me password
//!
//! The credential is a server-issued JWT; the client checks structure and
//! expiry locally but never verifies the signature - the server stays
//! authoritative.

pub mod credentials;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::CredentialStore;
pub use session::{AuthBackend, SessionManager, SessionSnapshot, SessionStatus};
pub use store::TokenStore;
