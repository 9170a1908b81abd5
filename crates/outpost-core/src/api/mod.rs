//! REST API client module for the Outpost service.
//!
//! This module provides the `ApiClient` for the login exchange, identity
//! confirmation, and the template/environment catalog endpoints.
//!
//! The API uses JWT bearer token authentication; the token is obtained
//! through the login endpoint and carried on every subsequent request.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginSuccess};
pub use error::ApiError;
