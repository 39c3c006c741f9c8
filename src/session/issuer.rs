//! Token-issuance collaborator.
//!
//! The session layer only needs three calls from the auth backend: exchange a
//! refresh token, log in with credentials, and revoke a pair on logout.
//! [`HttpTokenIssuer`] talks to the JSON endpoints; tests plug in their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::token::TokenPair;
use crate::config::settings::ApiConfig;
use crate::error::IssuerError;

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Exchange a refresh token for a fresh pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IssuerError>;

    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, IssuerError>;

    /// Ask the backend to revoke both tokens.
    async fn logout(&self, pair: &TokenPair) -> Result<(), IssuerError>;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LogoutRequest<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

/// `{access_token, refresh_token, token_type?}`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    client: Client,
    api: ApiConfig,
}

impl HttpTokenIssuer {
    pub fn new(client: Client, api: ApiConfig) -> Self {
        Self { client, api }
    }

    async fn post_for_pair<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<TokenPair, IssuerError> {
        let url = self.api.url(path);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(self.api.request_timeout_ms))
            .json(body)
            .send()
            .await
            .map_err(|e| IssuerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "token endpoint rejected request");
            return Err(IssuerError::Rejected { status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IssuerError::Transport(e.to_string()))?;
        let parsed: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|e| IssuerError::MalformedBody(e.to_string()))?;

        if parsed.access_token.is_empty() {
            return Err(IssuerError::MalformedBody("empty access_token".to_string()));
        }
        debug!(%url, token_type = ?parsed.token_type, "token pair issued");
        Ok(TokenPair::new(parsed.access_token, parsed.refresh_token))
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IssuerError> {
        self.post_for_pair(&self.api.refresh_path, &RefreshRequest { refresh_token })
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, IssuerError> {
        self.post_for_pair(&self.api.login_path, &LoginRequest { email, password })
            .await
    }

    async fn logout(&self, pair: &TokenPair) -> Result<(), IssuerError> {
        let url = self.api.url(&self.api.logout_path);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(self.api.request_timeout_ms))
            .json(&LogoutRequest {
                access_token: &pair.access_token,
                refresh_token: &pair.refresh_token,
            })
            .send()
            .await
            .map_err(|e| IssuerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(IssuerError::Rejected { status: status.as_u16() })
        }
    }
}
