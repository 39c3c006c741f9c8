//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks API endpoints, retry policy, storage and logging invariants

use tracing::{error, info};

use crate::config::settings::{
    ApiConfig, LoggingConfig, RetryConfig, ServiceConfig, StorageConfig, StorageKind,
};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_api(&cfg.settings.api, &mut errors);
    if let Some(retry) = &cfg.settings.retry {
        validate_retry("settings.retry", retry, &mut errors);
    }
    if let Some(storage) = &cfg.settings.storage {
        validate_storage(storage, &mut errors);
    }
    if let Some(logging) = &cfg.settings.logging {
        validate_logging(logging, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<String>) {
    let base = api.base_url.trim();
    if base.is_empty() {
        errors.push("settings.api.base_url cannot be empty".to_string());
    } else if reqwest::Url::parse(base).is_err() {
        errors.push(format!("settings.api.base_url '{}' is not a valid URL", base));
    } else if !(base.starts_with("http://") || base.starts_with("https://")) {
        errors.push(format!(
            "settings.api.base_url '{}' must use http or https",
            base
        ));
    }

    for (name, path) in [
        ("refresh_path", &api.refresh_path),
        ("login_path", &api.login_path),
        ("logout_path", &api.logout_path),
        ("profile_path", &api.profile_path),
    ] {
        if !path.starts_with('/') {
            errors.push(format!("settings.api.{} '{}' must start with '/'", name, path));
        }
    }

    if api.request_timeout_ms == 0 {
        errors.push("settings.api.request_timeout_ms must be > 0".to_string());
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.backoff_ms == Some(0) {
        errors.push(format!("{}.backoff_ms must be > 0", path));
    }
    if retry.timeout_ms == Some(0) {
        errors.push(format!("{}.timeout_ms must be > 0", path));
    }
}

fn validate_storage(storage: &StorageConfig, errors: &mut Vec<String>) {
    if storage.kind == StorageKind::File
        && storage.path.as_ref().map_or(true, |p| p.trim().is_empty())
    {
        errors.push("settings.storage.path is required for kind 'file'".to_string());
    }
    if storage.scope.trim().is_empty()
        || storage.scope.contains('/')
        || storage.scope.contains("..")
    {
        errors.push(format!(
            "settings.storage.scope '{}' must be a plain directory name",
            storage.scope
        ));
    }
}

fn validate_logging(logging: &LoggingConfig, errors: &mut Vec<String>) {
    let valid = ["trace", "debug", "info", "warn", "error"];
    if !valid.contains(&logging.level.as_str()) {
        errors.push(format!(
            "settings.logging.level '{}' invalid; allowed: {:?}",
            logging.level, valid
        ));
    }
}
