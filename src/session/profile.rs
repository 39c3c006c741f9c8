use std::time::Duration;

use anyhow::{anyhow, Result};
use http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::settings::ApiConfig;
use crate::utils::constants::NO_SESSION_ID;

/// Profile projection of the signed-in user. Not auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    pub id: i64,
}

impl Session {
    pub fn sentinel() -> Self {
        Self {
            email: String::new(),
            username: String::new(),
            id: NO_SESSION_ID,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == NO_SESSION_ID
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::sentinel()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Reads `GET {profile_path}` with caller-supplied auth headers.
#[derive(Debug, Clone)]
pub struct UserProfileLoader {
    client: Client,
    api: ApiConfig,
}

impl UserProfileLoader {
    pub fn new(client: Client, api: ApiConfig) -> Self {
        Self { client, api }
    }

    pub async fn load(&self, headers: HeaderMap) -> Result<Session> {
        let url = self.api.url(&self.api.profile_path);
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .timeout(Duration::from_millis(self.api.request_timeout_ms))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("profile request failed: {}", response.status()));
        }
        Ok(response.json::<Session>().await?)
    }
}
