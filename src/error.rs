//! Error taxonomy shared by the session and fetch layers.
//!
//! Every error here is `Clone`: a single refresh outcome is handed to every
//! caller that joined the in-flight exchange, and the terminal fetch error is
//! both returned and kept in the observable fetch state.

use thiserror::Error;

/// Failure talking to the token-issuance collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IssuerError {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("token endpoint rejected request: status {status}")]
    Rejected { status: u16 },

    #[error("malformed token endpoint response: {0}")]
    MalformedBody(String),
}

/// Refresh-token exchange failed. The token store is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("token refresh failed: {0}")]
    Issuer(#[from] IssuerError),

    /// `set_session` or `reset_session` ran while the exchange was in flight;
    /// its pair was discarded.
    #[error("session changed while the token refresh was in flight")]
    Superseded,

    #[error("access token is not a valid header value: {0}")]
    InvalidHeader(String),
}

impl RefreshError {
    pub fn reason(&self) -> &'static str {
        match self {
            RefreshError::Issuer(IssuerError::Transport(_)) => "transport",
            RefreshError::Issuer(IssuerError::Rejected { .. }) => "rejected",
            RefreshError::Issuer(IssuerError::MalformedBody(_)) => "malformed",
            RefreshError::Superseded => "superseded",
            RefreshError::InvalidHeader(_) => "invalid_header",
        }
    }
}

/// Errors surfaced by explicit session entry points (login).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("login failed: {0}")]
    Login(IssuerError),
}

/// Failure of a single fetch attempt. Only the last attempt's error reaches
/// the caller of `ResilientFetch::execute`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("attempt timed out after {timeout_ms} ms")]
    AttemptTimeout { timeout_ms: u64 },

    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("session manager is no longer alive")]
    SessionClosed,
}

impl FetchError {
    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Refresh(_) => "refresh",
            FetchError::AttemptTimeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "status",
            FetchError::Decode(_) => "decode",
            FetchError::Transport(_) => "transport",
            FetchError::SessionClosed => "session_closed",
        }
    }
}
