//! API client for communicating with the Outpost REST API.
//!
//! This module provides the `ApiClient` struct for the credential exchange,
//! identity confirmation, and fetching the template and environment lists.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::session::AuthBackend;
use crate::models::{Environment, Identity, Template};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Decoded, validated result of a successful login exchange.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub identity: Identity,
    pub credential: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: Identity,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

/// API client for the Outpost service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given service base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Drop the bearer token after logout
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Exchange account credentials for a bearer token and identity.
    ///
    /// The response is decoded and validated here, before any session state
    /// changes: the caller receives either a complete `LoginSuccess` or a
    /// typed error, never a partially-shaped payload.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, ApiError> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // The login endpoint reports rejected credentials this way; the
            // body may carry a human-readable reason we don't need.
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, reason = %Self::error_message(&body), "Login rejected");
            return Err(ApiError::InvalidCredentials);
        }

        let response = Self::check_response(response).await?;
        let payload: LoginResponse = response.json().await?;

        if payload.token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "login response carried an empty token".to_string(),
            ));
        }

        Ok(LoginSuccess {
            identity: payload.user,
            credential: payload.token,
        })
    }

    /// Re-validate a stored credential against the server and fetch the
    /// account it belongs to.
    pub async fn confirm_identity(&self, credential: &str) -> Result<Identity, ApiError> {
        let url = format!("{}/auth/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Extract the `message` field from an error payload, if any
    fn error_message(body: &str) -> String {
        serde_json::from_str::<ErrorPayload>(body)
            .ok()
            .and_then(|p| p.message)
            .unwrap_or_else(|| "no reason given".to_string())
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.get(url);
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return Ok(response.json().await?);
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch the template catalog
    pub async fn fetch_templates(&self) -> Result<Vec<Template>, ApiError> {
        let url = format!("{}/templates", self.base_url);
        self.get(&url).await
    }

    /// Fetch the environments owned by the authenticated account
    pub async fn fetch_environments(&self) -> Result<Vec<Environment>, ApiError> {
        let url = format!("{}/environments", self.base_url);
        self.get(&url).await
    }
}

impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, ApiError> {
        ApiClient::login(self, email, password).await
    }

    async fn confirm_identity(&self, credential: &str) -> Result<Identity, ApiError> {
        ApiClient::confirm_identity(self, credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_parses_wire_shape() {
        let json = r#"{"token":"aaa.bbb.ccc","user":{"id":"u-9","email":"pat@example.com","displayName":"Pat"}}"#;
        let parsed: LoginResponse = serde_json::from_str(json).expect("login response should parse");
        assert_eq!(parsed.token, "aaa.bbb.ccc");
        assert_eq!(parsed.user.email, "pat@example.com");
        assert_eq!(parsed.user.display_name.as_deref(), Some("Pat"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            ApiClient::error_message(r#"{"message":"account locked"}"#),
            "account locked"
        );
        assert_eq!(ApiClient::error_message("not json"), "no reason given");
        assert_eq!(ApiClient::error_message(r#"{}"#), "no reason given");
    }
}
