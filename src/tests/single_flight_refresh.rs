#[cfg(test)]
mod test {

use std::time::Duration;

use futures::future::join_all;
use http::header::{ACCEPT, AUTHORIZATION};
use http::HeaderMap;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use crate::cache::storage::MemoryStorage;
use crate::cache::token::TokenPair;
use crate::config::settings::ApiConfig;
use crate::error::{IssuerError, RefreshError};
use crate::session::issuer::HttpTokenIssuer;
use crate::session::manager::SessionState;
use crate::tests::common::{
    build_reqwest_client, expired_jwt, session_with_issuer, session_with_storage, valid_jwt,
    StubIssuer,
};

#[tokio::test]
async fn concurrent_expired_callers_share_one_refresh() {
    let fresh = TokenPair::new(valid_jwt(), "refresh-new");
    let issuer = StubIssuer::new(Duration::from_millis(50), Ok(fresh.clone()));
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    session.set_session(TokenPair::new(expired_jwt(), "refresh-old"));
    assert_eq!(session.state(), SessionState::Stale);

    let results = join_all((0..8).map(|_| session.get_auth_headers(HeaderMap::new()))).await;

    assert_eq!(issuer.calls(), 1);
    let expected = format!("Bearer {}", fresh.access_token);
    for headers in results {
        let headers = headers.expect("headers");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), expected.as_str());
    }
    assert_eq!(session.tokens(), fresh);
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(*issuer.seen_refresh_tokens.lock().unwrap(), vec!["refresh-old".to_owned()]);
}

#[tokio::test]
async fn concurrent_callers_share_one_failure_and_store_is_untouched() {
    let issuer = StubIssuer::new(
        Duration::from_millis(30),
        Err(IssuerError::Rejected { status: 401 }),
    );
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    let stale = TokenPair::new(expired_jwt(), "revoked");
    session.set_session(stale.clone());

    let results = join_all((0..5).map(|_| session.get_auth_headers(HeaderMap::new()))).await;

    assert_eq!(issuer.calls(), 1);
    for result in results {
        assert_eq!(
            result.unwrap_err(),
            RefreshError::Issuer(IssuerError::Rejected { status: 401 })
        );
    }
    assert_eq!(session.tokens(), stale);
}

#[tokio::test]
async fn sequential_refreshes_are_not_coalesced() {
    let issuer = StubIssuer::new(
        Duration::from_millis(1),
        Err(IssuerError::Transport("connection refused".into())),
    );
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    session.set_session(TokenPair::new(expired_jwt(), "r"));

    assert!(session.get_auth_headers(HeaderMap::new()).await.is_err());
    assert!(session.get_auth_headers(HeaderMap::new()).await.is_err());
    assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn valid_token_skips_refresh() {
    let issuer = StubIssuer::new(Duration::ZERO, Ok(TokenPair::new(valid_jwt(), "x")));
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    let access = valid_jwt();
    session.set_session(TokenPair::new(access.clone(), "r"));

    let headers = session.get_auth_headers(HeaderMap::new()).await.unwrap();
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), format!("Bearer {access}").as_str());
    assert_eq!(issuer.calls(), 0);
}

#[tokio::test]
async fn explicit_refresh_always_exchanges() {
    let fresh = TokenPair::new(valid_jwt(), "rotated");
    let issuer = StubIssuer::new(Duration::ZERO, Ok(fresh.clone()));
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    session.set_session(TokenPair::new(valid_jwt(), "current"));

    assert_eq!(session.refresh().await.unwrap(), fresh);
    assert_eq!(session.refresh().await.unwrap(), fresh);
    assert_eq!(issuer.calls(), 2);
    assert_eq!(session.tokens(), fresh);
}

#[tokio::test]
async fn caller_headers_win_on_collision() {
    let issuer = StubIssuer::new(Duration::ZERO, Ok(TokenPair::empty()));
    let session = session_with_issuer(issuer, "http://127.0.0.1:9");
    session.set_session(TokenPair::new(valid_jwt(), "r"));

    let mut extra = HeaderMap::new();
    extra.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
    extra.insert("x-request-id", "42".parse().unwrap());

    let headers = session.get_auth_headers(extra).await.unwrap();
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic abc");
    assert_eq!(headers.get("x-request-id").unwrap(), "42");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reset_session_then_headers_fails_fast_with_empty_refresh_token() {
    let server = MockServer::start_async().await;
    let refresh_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/refresh")
                .json_body(json!({"refresh_token": ""}));
            then.status(401)
                .header("Content-Type", "application/json")
                .json_body(json!({"detail": "Invalid refresh token"}));
        })
        .await;

    let api = ApiConfig::new(server.base_url());
    let issuer = std::sync::Arc::new(HttpTokenIssuer::new(build_reqwest_client(), api));
    let session = session_with_storage(issuer, &server.base_url(), std::sync::Arc::new(MemoryStorage::new()));
    session.set_session(TokenPair::new(valid_jwt(), "refresh"));

    session.reset_session();
    assert!(session.is_expired());
    assert_eq!(session.state(), SessionState::LoggedOut);

    let err = session.get_auth_headers(HeaderMap::new()).await.unwrap_err();
    assert_eq!(err, RefreshError::Issuer(IssuerError::Rejected { status: 401 }));
    refresh_mock.assert_async().await;
    assert_eq!(session.tokens(), TokenPair::empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_issuer_rotates_pair_and_rejects_malformed_bodies() {
    let server = MockServer::start_async().await;
    let fresh_access = valid_jwt();
    let ok_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/refresh")
                .json_body(json!({"refresh_token": "good"}));
            then.status(200).json_body(json!({
                "access_token": fresh_access,
                "refresh_token": "good-2",
                "token_type": "bearer"
            }));
        })
        .await;
    let malformed_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/refresh")
                .json_body(json!({"refresh_token": "weird"}));
            then.status(200).body("<html>gateway</html>");
        })
        .await;

    let api = ApiConfig::new(server.base_url());
    let issuer = std::sync::Arc::new(HttpTokenIssuer::new(build_reqwest_client(), api));
    let session = session_with_issuer(issuer, &server.base_url());

    session.set_session(TokenPair::new(expired_jwt(), "good"));
    let pair = session.refresh().await.unwrap();
    assert_eq!(pair, TokenPair::new(fresh_access.clone(), "good-2"));
    ok_mock.assert_async().await;

    session.set_session(TokenPair::new(expired_jwt(), "weird"));
    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, RefreshError::Issuer(IssuerError::MalformedBody(_))));
    malformed_mock.assert_async().await;
    assert_eq!(session.tokens().refresh_token, "weird");
}

#[tokio::test]
async fn reset_during_refresh_is_not_undone() {
    let issuer = StubIssuer::new(
        Duration::from_millis(100),
        Ok(TokenPair::new(valid_jwt(), "new")),
    );
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    session.set_session(TokenPair::new(expired_jwt(), "old"));

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.get_auth_headers(HeaderMap::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(issuer.calls(), 1);

    session.reset_session();
    assert_eq!(session.state(), SessionState::LoggedOut);

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err, RefreshError::Superseded);
    assert_eq!(session.state(), SessionState::LoggedOut);
    assert_eq!(session.tokens(), TokenPair::empty());
}

#[tokio::test]
async fn login_during_refresh_keeps_the_newer_pair() {
    let issuer = StubIssuer::new(
        Duration::from_millis(100),
        Ok(TokenPair::new(valid_jwt(), "from-refresh")),
    );
    let session = session_with_issuer(issuer.clone(), "http://127.0.0.1:9");
    session.set_session(TokenPair::new(expired_jwt(), "old"));

    let pending = {
        let session = session.clone();
        tokio::spawn(async move { session.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let login_pair = TokenPair::new(valid_jwt(), "from-login");
    session.set_session(login_pair.clone());

    assert_eq!(pending.await.unwrap().unwrap_err(), RefreshError::Superseded);
    assert_eq!(session.tokens(), login_pair);
    assert_eq!(session.state(), SessionState::Active);

    // the superseded flight is gone; a new refresh exchanges the login token
    session.refresh().await.unwrap();
    assert_eq!(
        *issuer.seen_refresh_tokens.lock().unwrap(),
        vec!["old".to_owned(), "from-login".to_owned()]
    );
}

#[tokio::test]
async fn multi_valued_extra_headers_are_kept() {
    let issuer = StubIssuer::new(Duration::ZERO, Ok(TokenPair::empty()));
    let session = session_with_issuer(issuer, "http://127.0.0.1:9");
    let access = valid_jwt();
    session.set_session(TokenPair::new(access.clone(), "r"));

    let mut extra = HeaderMap::new();
    extra.append(ACCEPT, "application/json".parse().unwrap());
    extra.append(ACCEPT, "text/plain".parse().unwrap());

    let headers = session.get_auth_headers(extra).await.unwrap();
    let accept: Vec<_> = headers.get_all(ACCEPT).iter().collect();
    assert_eq!(accept, vec!["application/json", "text/plain"]);
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), format!("Bearer {access}").as_str());
}

}
