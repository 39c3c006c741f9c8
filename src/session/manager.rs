use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::cache::storage::{FileStorage, MemoryStorage, ScopedStorage};
use crate::cache::token::TokenPair;
use crate::cache::token_store::TokenStore;
use crate::config::settings::{SettingsConfig, StorageKind};
use crate::error::{RefreshError, SessionError};
use crate::observability::metrics::get_metrics;
use crate::session::issuer::{HttpTokenIssuer, TokenIssuer};
use crate::session::profile::{Session, UserProfileLoader};
use crate::utils::constants::BEARER_PREFIX;

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// Session-level view of the token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// no tokens
    LoggedOut,
    /// access token valid
    Active,
    /// access token expired, refresh pending or possible
    Stale,
}

/// Single point of truth for "is the caller authenticated, and which headers
/// prove it". Built once at startup and shared as `Arc<SessionManager>`.
///
/// At most one refresh exchange is in flight at any time: callers that need a
/// refresh while one is running await the same shared future and receive the
/// same outcome.
pub struct SessionManager {
    store: Arc<RwLock<TokenStore>>,
    issuer: Arc<dyn TokenIssuer>,
    profile_loader: UserProfileLoader,
    session: RwLock<Session>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn ScopedStorage>,
        issuer: Arc<dyn TokenIssuer>,
        profile_loader: UserProfileLoader,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(TokenStore::load(storage))),
            issuer,
            profile_loader,
            session: RwLock::new(Session::sentinel()),
            in_flight: Mutex::new(None),
        }
    }

    /// Wire storage, issuer and profile loader from settings.
    pub fn from_settings(client: Client, settings: &SettingsConfig) -> anyhow::Result<Arc<Self>> {
        let storage_config = settings.storage.clone().unwrap_or_default();
        let storage: Arc<dyn ScopedStorage> = match storage_config.kind {
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
            StorageKind::File => {
                let path = storage_config
                    .path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("settings.storage.path is required for file storage"))?;
                Arc::new(FileStorage::new(path, &storage_config.scope)?)
            }
        };
        info!(kind = ?storage_config.kind, scope = %storage_config.scope, "token storage selected");

        let issuer = Arc::new(HttpTokenIssuer::new(client.clone(), settings.api.clone()));
        let profile_loader = UserProfileLoader::new(client, settings.api.clone());
        Ok(Arc::new(Self::new(storage, issuer, profile_loader)))
    }

    /// Current pair, straight from the store.
    pub fn tokens(&self) -> TokenPair {
        self.store_read().read()
    }

    pub fn is_expired(&self) -> bool {
        self.store_read().is_expired()
    }

    pub fn state(&self) -> SessionState {
        let store = self.store_read();
        let pair = store.read();
        if pair.access_token.is_empty() && pair.refresh_token.is_empty() {
            SessionState::LoggedOut
        } else if store.is_expired() {
            SessionState::Stale
        } else {
            SessionState::Active
        }
    }

    /// Read-only profile projection.
    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// `extra` plus `Authorization: Bearer <access>`, unless `extra` already
    /// carries its own `Authorization`. Refreshes first when the access token
    /// is expired.
    pub async fn get_auth_headers(&self, extra: HeaderMap) -> Result<HeaderMap, RefreshError> {
        let access_token = match self.refresh_if_expired().await? {
            Some(pair) => pair.access_token,
            None => self.store_read().read().access_token,
        };

        let bearer = HeaderValue::from_str(&format!("{BEARER_PREFIX}{access_token}"))
            .map_err(|e| RefreshError::InvalidHeader(e.to_string()))?;

        // start from the caller's map so multi-valued headers survive intact
        let mut headers = extra;
        headers.entry(AUTHORIZATION).or_insert(bearer);
        Ok(headers)
    }

    /// Exchange the current refresh token for a new pair. Joins the running
    /// exchange if there is one. On failure the store is left unchanged.
    pub async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        let (flight, joined) = {
            let mut slot = self.slot();
            self.join_or_start(&mut slot)
        };
        self.await_flight(flight, joined).await
    }

    /// Login entry point. A refresh still in flight will not overwrite `pair`.
    pub fn set_session(&self, pair: TokenPair) {
        self.store_write().write(pair);
        *self.slot() = None;
        info!("session tokens set");
    }

    /// Logout entry point: clears the store and the profile projection. A
    /// refresh still in flight settles with `RefreshError::Superseded`.
    pub fn reset_session(&self) {
        self.store_write().clear();
        *self.slot() = None;
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Session::sentinel();
        info!("session reset");
    }

    /// Best-effort profile fetch; failures keep the previous projection.
    pub async fn initialize_profile(&self) -> Session {
        if self.store_read().is_empty() {
            *self
                .session
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Session::sentinel();
            return Session::sentinel();
        }

        let headers = match self.get_auth_headers(HeaderMap::new()).await {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "profile not loaded, auth headers unavailable");
                return self.session();
            }
        };

        match self.profile_loader.load(headers).await {
            Ok(profile) => {
                info!(id = profile.id, email = %profile.email, "profile loaded");
                *self
                    .session
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = profile.clone();
                profile
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed");
                self.session()
            }
        }
    }

    /// Credentials login followed by a best-effort profile load.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let pair = self
            .issuer
            .login(email, password)
            .await
            .map_err(SessionError::Login)?;
        self.set_session(pair);
        Ok(self.initialize_profile().await)
    }

    /// Revoke the pair on the backend (best-effort) and reset locally.
    pub async fn logout(&self) {
        let pair = self.tokens();
        if !pair.access_token.is_empty() || !pair.refresh_token.is_empty() {
            if let Err(e) = self.issuer.logout(&pair).await {
                warn!(error = %e, "server-side logout failed, clearing local session anyway");
            }
        }
        self.reset_session();
    }

    /// `Some(pair)` when this call waited on an exchange, `None` when the
    /// current token was still good.
    async fn refresh_if_expired(&self) -> Result<Option<TokenPair>, RefreshError> {
        if !self.is_expired() {
            return Ok(None);
        }
        let (flight, joined) = {
            let mut slot = self.slot();
            // re-check under the slot lock: a refresh that settled since the
            // first check already produced a usable token
            let pending = slot.as_ref().is_some_and(|f| f.peek().is_none());
            if !pending && !self.is_expired() {
                return Ok(None);
            }
            self.join_or_start(&mut slot)
        };
        self.await_flight(flight, joined).await.map(Some)
    }

    /// Join the pending exchange, or start one. `true` when joined.
    fn join_or_start(&self, slot: &mut Option<RefreshFlight>) -> (RefreshFlight, bool) {
        if let Some(flight) = slot.as_ref().filter(|f| f.peek().is_none()) {
            return (flight.clone(), true);
        }
        let flight = self.start_refresh();
        *slot = Some(flight.clone());
        (flight, false)
    }

    async fn await_flight(
        &self,
        flight: RefreshFlight,
        joined: bool,
    ) -> Result<TokenPair, RefreshError> {
        if joined {
            debug!("joining in-flight token refresh");
            get_metrics().await.refresh_coalesced.inc();
        }
        let outcome = flight.clone().await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        outcome
    }

    /// The exchange is bound to the store generation it started from; its
    /// pair is only written while that generation is still current.
    fn start_refresh(&self) -> RefreshFlight {
        let store = Arc::clone(&self.store);
        let issuer = Arc::clone(&self.issuer);
        let (refresh_token, generation) = {
            let guard = self.store_read();
            (guard.read().refresh_token, guard.generation())
        };

        async move {
            let metrics = get_metrics().await;
            metrics.refresh_requests.inc();
            info!("refreshing access token");

            match issuer.refresh(&refresh_token).await {
                Ok(pair) => {
                    let mut guard = store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                    if guard.generation() != generation {
                        let e = RefreshError::Superseded;
                        metrics.refresh_failures.with_label_values(&[e.reason()]).inc();
                        warn!("session changed during token refresh, new pair discarded");
                        return Err(e);
                    }
                    guard.write(pair.clone());
                    info!(expires_at = ?guard.expires_at(), "access token refreshed");
                    Ok(pair)
                }
                Err(e) => {
                    let e = RefreshError::Issuer(e);
                    metrics.refresh_failures.with_label_values(&[e.reason()]).inc();
                    warn!(error = %e, "token refresh failed");
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn slot(&self) -> MutexGuard<'_, Option<RefreshFlight>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_read(&self) -> RwLockReadGuard<'_, TokenStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, TokenStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
