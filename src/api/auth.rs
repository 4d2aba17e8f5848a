//! Credential extraction for the REST API
//!
//! Two headers guard the API surface:
//! - `X-Provider-Key` carries the caller's own provider secret key; it is
//!   validated for shape locally and then forwarded verbatim on every
//!   provider call. The service never stores it.
//! - `X-Webhook-Secret` optionally guards the payment-confirmation webhook
//!   when `ApiConfig::webhook_secret` is set; compared in constant time.

use axum::http::HeaderMap;

use crate::error::{CredentialError, Error, Result};

/// Header carrying the caller's provider secret key
pub const PROVIDER_KEY_HEADER: &str = "x-provider-key";

/// Header carrying the shared webhook secret
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Extract and shape-check the caller's provider credential
///
/// Rejects missing, non-UTF-8, empty, and wrongly-prefixed values before any
/// remote call is made, so a typo never reaches the provider.
pub fn provider_credential(headers: &HeaderMap) -> Result<String> {
    let value = headers
        .get(PROVIDER_KEY_HEADER)
        .ok_or(Error::Credential(CredentialError::Missing))?;

    let credential = value.to_str().map_err(|_| {
        Error::Credential(CredentialError::Malformed {
            reason: "header value is not valid UTF-8".to_string(),
        })
    })?;

    crate::exporter::validate_credential(credential)?;
    Ok(credential.to_string())
}

/// Check the webhook shared secret, if one is configured
///
/// Returns true when no secret is configured (open endpoint, local
/// development) or when the header matches exactly. The comparison is
/// constant time so the check leaks nothing about the expected value.
pub fn verify_webhook_secret(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    match headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(provided) => constant_time_eq(provided.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
