//! Resilient fetch: one logical GET with per-attempt timeout, bounded linear
//! retries and bearer auth from the [`SessionManager`].
//!
//! The retry algorithm lives in [`RetryPolicy`]; this module adds the HTTP
//! attempt and the observable `data` / `error` / `is_loading` projection,
//! published through a `tokio::sync::watch` channel.

use std::sync::{Arc, Weak};

use http::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetryPolicy;
use crate::session::manager::SessionManager;

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

/// Snapshot of the last `execute` run.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    /// last successful payload
    pub data: Option<T>,
    /// set only after a terminal failure
    pub error: Option<FetchError>,
    pub is_loading: bool,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
        }
    }
}

pub struct ResilientFetch<T> {
    url: String,
    policy: RetryPolicy,
    client: Client,
    session: Weak<SessionManager>,
    state: watch::Sender<FetchState<T>>,
}

impl<T> ResilientFetch<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(client: Client, url: impl Into<String>, session: &Arc<SessionManager>) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            url: url.into(),
            policy: RetryPolicy::default(),
            client,
            session: Arc::downgrade(session),
            state,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Live updates of `data` / `error` / `is_loading`.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    /// Run the full attempt sequence. Safe to call repeatedly; every call
    /// starts from attempt zero.
    pub async fn execute(&self) -> Result<T, FetchError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let result = self
            .policy
            .run_with_retry(|attempt| self.attempt(attempt))
            .await;

        let outcome = match &result {
            Ok(value) => {
                let value = value.clone();
                self.state.send_modify(|state| {
                    state.data = Some(value);
                    state.is_loading = false;
                });
                info!(url = %self.url, "fetch succeeded");
                SUCCESS_MSG
            }
            Err(e) => {
                let e = e.clone();
                self.state.send_modify(|state| {
                    state.error = Some(e);
                    state.is_loading = false;
                });
                ERROR_MSG
            }
        };
        metrics
            .fetch_duration
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn attempt(&self, attempt: u32) -> Result<T, FetchError> {
        let metrics = get_metrics().await;
        metrics.fetch_attempts.inc();
        debug!(url = %self.url, attempt, "fetch attempt");

        let result = self.try_once().await;
        if let Err(e) = &result {
            metrics.fetch_failures.with_label_values(&[e.reason()]).inc();
        }
        result
    }

    async fn try_once(&self) -> Result<T, FetchError> {
        // header acquisition may refresh; it runs before the attempt governor is armed
        let headers = {
            let session = self.session.upgrade().ok_or(FetchError::SessionClosed)?;
            session.get_auth_headers(HeaderMap::new()).await?
        };

        self.policy
            .with_attempt_timeout(async {
                let response = self
                    .client
                    .get(&self.url)
                    .headers(headers)
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::HttpStatus { status: status.as_u16() });
                }

                let body = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                serde_json::from_slice::<T>(&body).map_err(|e| FetchError::Decode(e.to_string()))
            })
            .await
    }
}

/// One-shot form: build a fetch for `url` and run it once.
pub async fn fetch_json<T>(
    client: Client,
    session: &Arc<SessionManager>,
    url: &str,
    policy: RetryPolicy,
) -> Result<T, FetchError>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    ResilientFetch::new(client, url, session)
        .with_policy(policy)
        .execute()
        .await
}
