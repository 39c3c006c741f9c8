use serde::Deserialize;

use crate::resilience::retry::RetryPolicy;
use crate::utils::constants::DEFAULT_HTTP_TIMEOUT_MS;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    pub api: ApiConfig,
    pub retry: Option<RetryConfig>,
    pub storage: Option<StorageConfig>,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// ================================
/// Remote API
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// e.g. http://localhost:8000/api/v1
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    /// budget for issuer and profile calls, which are not retried
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            profile_path: default_profile_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// ================================
/// Retry policy defaults for fetches
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetryConfig {
    /// extra attempts after the first one
    pub max_retries: Option<u32>,
    /// linear: attempt n waits n * backoff_ms
    pub backoff_ms: Option<u64>,
    /// per-attempt budget
    pub timeout_ms: Option<u64>,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            backoff_ms: self.backoff_ms.unwrap_or(defaults.backoff_ms),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
        }
    }
}

/// ================================
/// Token storage
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// base directory, required for `file`
    pub path: Option<String>,
    /// session scope; one directory per scope
    #[serde(default = "default_storage_scope")]
    pub scope: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            path: None,
            scope: default_storage_scope(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub is_enabled: bool,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_profile_path() -> String {
    "/users/me".to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

fn default_storage_scope() -> String {
    "default".to_string()
}
