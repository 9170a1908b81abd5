//! Structural validation of the bearer credential.
//!
//! The credential is a three-segment JWT whose payload carries an `exp`
//! claim. Validation here is purely structural plus an expiry check - the
//! signature is NOT verified. This is a UX guard that keeps the client from
//! presenting a token the server is guaranteed to refuse; the server remains
//! the authority on whether a credential is actually accepted.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

/// Claims the client cares about. `exp` is required; the rest feed the
/// identity fallback when the server cannot be reached.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decode the payload segment of a credential into its claims.
///
/// Returns `None` for anything malformed: wrong segment count, invalid
/// base64url, invalid JSON, or a missing/ill-typed `exp`. Never panics.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = segments.next()?;
    let _signature = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let bytes = match general_purpose::URL_SAFE_NO_PAD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Credential payload is not valid base64url");
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "Credential payload is not a valid claims object");
            None
        }
    }
}

/// Check whether a credential is well-formed and unexpired.
///
/// A token whose `exp` equals the current time is treated as expired: a
/// credential on the boundary would be refused by the server before the
/// request carrying it arrives anyway.
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, Utc::now().timestamp())
}

fn is_valid_at(token: &str, now_secs: i64) -> bool {
    match decode_claims(token) {
        Some(claims) => claims.exp > now_secs,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a structurally valid token with the given payload JSON
    fn token_with_payload(payload: &str) -> String {
        let encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload);
        format!("hdr.{}.sig", encoded)
    }

    fn token_with_exp(exp: i64) -> String {
        token_with_payload(&format!(r#"{{"sub":"u-1","email":"pat@example.com","exp":{}}}"#, exp))
    }

    #[test]
    fn test_rejects_missing_segments() {
        assert!(!is_valid_at("", 1000));
        assert!(!is_valid_at("onlyone", 1000));
        assert!(!is_valid_at("two.segments", 1000));
        assert!(!is_valid_at("a.b.c.d", 1000));
    }

    #[test]
    fn test_rejects_invalid_base64() {
        assert!(!is_valid_at("hdr.!!not-base64!!.sig", 1000));
        // Padded base64 is also rejected - token segments are unpadded
        let padded = general_purpose::URL_SAFE.encode(r#"{"exp":99999}"#);
        assert!(padded.contains('='));
        assert!(!is_valid_at(&format!("hdr.{}.sig", padded), 1000));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let garbage = general_purpose::URL_SAFE_NO_PAD.encode("{not json");
        assert!(!is_valid_at(&format!("hdr.{}.sig", garbage), 1000));
    }

    #[test]
    fn test_rejects_missing_or_illtyped_exp() {
        assert!(!is_valid_at(&token_with_payload(r#"{"sub":"u-1"}"#), 1000));
        assert!(!is_valid_at(&token_with_payload(r#"{"exp":"soon"}"#), 1000));
        assert!(!is_valid_at(&token_with_payload(r#"{"exp":null}"#), 1000));
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = 1_750_000_000;
        assert!(is_valid_at(&token_with_exp(now + 1), now));
        // Boundary: exp == now is expired
        assert!(!is_valid_at(&token_with_exp(now), now));
        assert!(!is_valid_at(&token_with_exp(now - 1), now));
    }

    #[test]
    fn test_decode_claims_surfaces_identity_fields() {
        let claims = decode_claims(&token_with_exp(9_999_999_999)).expect("claims should decode");
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
        assert_eq!(claims.email.as_deref(), Some("pat@example.com"));
        assert!(claims.name.is_none());
    }

    #[test]
    fn test_decode_claims_fails_closed() {
        assert!(decode_claims("").is_none());
        assert!(decode_claims("a.b").is_none());
        assert!(decode_claims(&token_with_payload("[]")).is_none());
    }
}
