// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;

use crate::cache::storage::{MemoryStorage, ScopedStorage};
use crate::cache::token::TokenPair;
use crate::config::settings::ApiConfig;
use crate::error::IssuerError;
use crate::session::issuer::TokenIssuer;
use crate::session::manager::SessionManager;
use crate::session::profile::UserProfileLoader;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Unsigned JWT carrying only the claims the client looks at.
pub fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"exp": exp, "sub": "1", "type": "access"}).to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn valid_jwt() -> String {
    make_jwt(Utc::now().timestamp() + 3600)
}

pub fn expired_jwt() -> String {
    make_jwt(Utc::now().timestamp() - 60)
}

/// Issuer double: counts exchanges, remembers the refresh tokens it was
/// handed, and answers with a fixed outcome after `delay`.
pub struct StubIssuer {
    pub calls: AtomicUsize,
    pub seen_refresh_tokens: Mutex<Vec<String>>,
    pub delay: Duration,
    pub outcome: Result<TokenPair, IssuerError>,
}

impl StubIssuer {
    pub fn new(delay: Duration, outcome: Result<TokenPair, IssuerError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
            delay,
            outcome,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for StubIssuer {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IssuerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens.lock().unwrap().push(refresh_token.to_owned());
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<TokenPair, IssuerError> {
        self.outcome.clone()
    }

    async fn logout(&self, _pair: &TokenPair) -> Result<(), IssuerError> {
        Ok(())
    }
}

/// Session over memory storage; profile calls go to `api_base`.
pub fn session_with_issuer(issuer: Arc<dyn TokenIssuer>, api_base: &str) -> Arc<SessionManager> {
    session_with_storage(issuer, api_base, Arc::new(MemoryStorage::new()))
}

pub fn session_with_storage(
    issuer: Arc<dyn TokenIssuer>,
    api_base: &str,
    storage: Arc<dyn ScopedStorage>,
) -> Arc<SessionManager> {
    let loader = UserProfileLoader::new(build_reqwest_client(), ApiConfig::new(api_base));
    Arc::new(SessionManager::new(storage, issuer, loader))
}
