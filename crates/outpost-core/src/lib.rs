//! Core library for the Outpost client: API client, session state machine,
//! access guards, domain models, and configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError, LoginSuccess};
pub use auth::{CredentialStore, SessionManager, SessionSnapshot, SessionStatus, TokenStore};
pub use config::Config;
pub use guard::{AccessGuard, GuardOutcome, NavigationIntent, RequireAnonymous, RequireAuthenticated};
pub use models::{Environment, Identity, Template};
