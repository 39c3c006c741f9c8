//! Shared constants and invariants

// scoped storage slots
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
/// overall budget for issuer/profile calls, which are not retried
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

pub const BEARER_PREFIX: &str = "Bearer ";

// session id sentinel, "no session"
pub const NO_SESSION_ID: i64 = -1;
