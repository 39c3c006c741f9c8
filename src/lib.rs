//! # Session Agent Library
//!
//! Keeps a bearer access/refresh token pair valid for the lifetime of a
//! client session and runs HTTP calls with per-attempt timeouts, bounded
//! retries and transparent token refresh.
//!
//! Modules:
//! - `cache`: token pair, token store and scoped storage backends
//! - `session`: session manager (single-flight refresh), token issuer, profile
//! - `resilience`: retry policy and the resilient fetch handle
//! - `parser`: access token expiry decoding
//! - `config`: YAML configuration, defaults and validation

pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod session;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token::TokenPair;
pub use crate::error::{FetchError, IssuerError, RefreshError, SessionError};
pub use crate::resilience::fetch::{FetchState, ResilientFetch};
pub use crate::resilience::retry::RetryPolicy;
pub use crate::session::manager::{SessionManager, SessionState};
pub use crate::session::profile::Session;
