use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::storage::ScopedStorage;
use crate::cache::token::TokenPair;
use crate::parser::jwt::{is_expired_at, token_expiration};
use crate::utils::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Holds the current token pair and its derived expiry, mirrored into scoped
/// storage. Reads are served from memory.
#[derive(Debug)]
pub struct TokenStore {
    pair: TokenPair,
    /// unix seconds, `None` when the access token can't be decoded
    expires_at: Option<i64>,
    /// bumped on every write and clear
    generation: u64,
    storage: Arc<dyn ScopedStorage>,
}

impl TokenStore {
    /// Restore whatever the storage scope already holds.
    pub fn load(storage: Arc<dyn ScopedStorage>) -> Self {
        let pair = TokenPair::new(
            storage.get(ACCESS_TOKEN_KEY).unwrap_or_default(),
            storage.get(REFRESH_TOKEN_KEY).unwrap_or_default(),
        );
        let expires_at = token_expiration(&pair.access_token);
        debug!(has_tokens = !pair.is_empty(), ?expires_at, "token store loaded");
        Self { pair, expires_at, generation: 0, storage }
    }

    pub fn read(&self) -> TokenPair {
        self.pair.clone()
    }

    /// Replace both tokens. Storage failures are logged; memory is always updated.
    pub fn write(&mut self, pair: TokenPair) {
        self.expires_at = token_expiration(&pair.access_token);
        self.persist(&pair);
        self.pair = pair;
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.pair = TokenPair::empty();
        self.expires_at = None;
        self.generation += 1;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            let _ = self
                .storage
                .remove(key)
                .inspect_err(|e| warn!(key, error = %e, "failed to clear token slot"));
        }
    }

    /// Changes whenever the pair is replaced or cleared. A refresh compares it
    /// before writing so it never overwrites a newer session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expires_at)
    }

    pub fn is_empty(&self) -> bool {
        self.pair.is_empty()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Both slots or neither: when the refresh slot can't be written, the
    /// access slot is put back to what it held before.
    fn persist(&self, pair: &TokenPair) {
        let previous_access = self.storage.get(ACCESS_TOKEN_KEY);
        if let Err(e) = self.storage.set(ACCESS_TOKEN_KEY, &pair.access_token) {
            warn!(key = ACCESS_TOKEN_KEY, error = %e, "failed to persist token slot");
            return;
        }
        if let Err(e) = self.storage.set(REFRESH_TOKEN_KEY, &pair.refresh_token) {
            warn!(key = REFRESH_TOKEN_KEY, error = %e, "failed to persist token slot, restoring previous pair");
            let restored = match previous_access {
                Some(value) => self.storage.set(ACCESS_TOKEN_KEY, &value),
                None => self.storage.remove(ACCESS_TOKEN_KEY),
            };
            let _ = restored
                .inspect_err(|e| warn!(key = ACCESS_TOKEN_KEY, error = %e, "failed to restore token slot"));
        }
    }
}
