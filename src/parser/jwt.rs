use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::helpers::time::now_i64;

// jwt token
#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub exp: i64,
}

/// Why an access token's expiry could not be derived. Never leaves this
/// crate: callers only see "expired".
#[derive(Debug, Error)]
pub(crate) enum ExpiryDecodeError {
    #[error("token is empty")]
    Empty,
    #[error("invalid JWT format")]
    Format,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JWT payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub(crate) fn decode_jwt_claims(token_string: &str) -> Result<JwtClaims, ExpiryDecodeError> {
    if token_string.is_empty() {
        return Err(ExpiryDecodeError::Empty);
    }
    let parts: Vec<&str> = token_string.split('.').collect();
    if parts.len() != 3 {
        return Err(ExpiryDecodeError::Format);
    }

    // JWT segments are base64url; some issuers keep the padding
    let payload = parts[1].trim_end_matches('=');
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload)?;

    Ok(serde_json::from_slice::<JwtClaims>(&decoded)?)
}

/// Unix timestamp of the `exp` claim, or `None` when the token can't be decoded.
pub fn token_expiration(token_value: &str) -> Option<i64> {
    decode_jwt_claims(token_value)
        .inspect_err(|e| debug!(error = %e, "access token expiry could not be decoded"))
        .ok()
        .map(|claims| claims.exp)
}

/// Expired when the expiry is unknown or `exp <= now`.
pub fn is_expired_at(expires_at: Option<i64>) -> bool {
    expires_at.map(|exp| exp <= now_i64()).unwrap_or(true)
}
