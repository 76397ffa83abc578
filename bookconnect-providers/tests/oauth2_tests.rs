//! Tests for the installed-application OAuth 2.0 flow: the loopback
//! receiver, the token endpoint calls and the token store integration.

use bookconnect_core::{ClientSecrets, FileTokenStore, StoredCredential};
use bookconnect_providers::oauth2::{
    AuthorizationCodeFlow, AuthorizationPrompt, LocalServerReceiver, OAuthError, SPREADSHEETS_SCOPE,
};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;
use wiremock::{matchers::*, Mock, MockServer, ResponseTemplate};

/// Sends a raw GET to the receiver and returns the full response text.
async fn send_callback(addr: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, addr);
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

// ============================================================================
// LocalServerReceiver
// ============================================================================

#[tokio::test]
async fn test_receiver_returns_code() {
    let receiver = LocalServerReceiver::bind().await.unwrap();
    let addr = receiver.local_addr().unwrap();
    assert!(addr.ip().is_loopback());
    assert_eq!(
        receiver.redirect_uri(),
        format!("http://127.0.0.1:{}/Callback", addr.port())
    );

    let browser = tokio::spawn(async move {
        send_callback(addr, "/Callback?code=4%2F0AX4XfWh&state=s1").await
    });

    let code = receiver.wait_for_code("s1").await.unwrap();
    assert_eq!(code, "4/0AX4XfWh");

    let response = browser.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("Received verification code"));
}

#[tokio::test]
async fn test_receiver_ignores_unrelated_requests() {
    let receiver = LocalServerReceiver::bind().await.unwrap();
    let addr = receiver.local_addr().unwrap();

    let browser = tokio::spawn(async move {
        let favicon = send_callback(addr, "/favicon.ico").await;
        let callback = send_callback(addr, "/Callback?state=s1&code=abc").await;
        (favicon, callback)
    });

    assert_eq!(receiver.wait_for_code("s1").await.unwrap(), "abc");
    let (favicon, callback) = browser.await.unwrap();
    assert!(favicon.starts_with("HTTP/1.1 404"));
    assert!(callback.starts_with("HTTP/1.1 200"));
}

#[tokio::test]
async fn test_receiver_skips_idle_connection() {
    let receiver = LocalServerReceiver::bind()
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(5))
        .with_request_timeout(Duration::from_millis(200));
    let addr = receiver.local_addr().unwrap();

    let browser = tokio::spawn(async move {
        // A speculative connection that never sends a request
        let idle = TcpStream::connect(addr).await.unwrap();
        let callback = send_callback(addr, "/Callback?code=abc&state=s1").await;
        drop(idle);
        callback
    });

    assert_eq!(receiver.wait_for_code("s1").await.unwrap(), "abc");
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 200"));
}

#[tokio::test]
async fn test_receiver_skips_closed_connection() {
    let receiver = LocalServerReceiver::bind().await.unwrap();
    let addr = receiver.local_addr().unwrap();

    let browser = tokio::spawn(async move {
        drop(TcpStream::connect(addr).await.unwrap());
        send_callback(addr, "/Callback?code=abc&state=s1").await
    });

    assert_eq!(receiver.wait_for_code("s1").await.unwrap(), "abc");
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 200"));
}

#[tokio::test]
async fn test_receiver_rejects_state_mismatch() {
    let receiver = LocalServerReceiver::bind().await.unwrap();
    let addr = receiver.local_addr().unwrap();
    let browser = tokio::spawn(async move { send_callback(addr, "/Callback?code=abc&state=forged").await });

    let result = receiver.wait_for_code("expected").await;
    assert!(matches!(result, Err(OAuthError::StateMismatch)));
    assert!(browser.await.unwrap().starts_with("HTTP/1.1 400"));
}

#[tokio::test]
async fn test_receiver_reports_denial() {
    let receiver = LocalServerReceiver::bind().await.unwrap();
    let addr = receiver.local_addr().unwrap();
    let browser = tokio::spawn(async move {
        send_callback(addr, "/Callback?error=access_denied&state=s1").await
    });

    match receiver.wait_for_code("s1").await {
        Err(OAuthError::Denied(reason)) => assert_eq!(reason, "access_denied"),
        other => panic!("Expected Denied error, got {:?}", other),
    }
    browser.await.unwrap();
}

#[tokio::test]
async fn test_receiver_times_out() {
    let receiver = LocalServerReceiver::bind()
        .await
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    assert!(matches!(
        receiver.wait_for_code("s1").await,
        Err(OAuthError::Timeout(_))
    ));
}

// ============================================================================
// AuthorizationCodeFlow
// ============================================================================

fn secrets(server: &MockServer) -> ClientSecrets {
    ClientSecrets {
        client_id: "client.apps.googleusercontent.com".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: format!("{}/o/oauth2/auth", server.uri()),
        token_uri: format!("{}/token", server.uri()),
        redirect_uris: vec!["http://localhost".to_string()],
    }
}

fn flow(server: &MockServer, dir: &TempDir) -> AuthorizationCodeFlow {
    AuthorizationCodeFlow::new(
        Client::new(),
        secrets(server),
        vec![SPREADSHEETS_SCOPE.to_string()],
        FileTokenStore::new(dir.path().join("google")),
    )
    .with_callback_timeout(Duration::from_secs(10))
}

/// Plays the browser: follows the authorization URL straight to the
/// redirect with a granted code.
struct GrantingBrowser;

impl AuthorizationPrompt for GrantingBrowser {
    fn present_url(&self, url: &str) -> io::Result<()> {
        let url = Url::parse(url).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["scope"], SPREADSHEETS_SCOPE);

        let redirect = Url::parse(&params["redirect_uri"]).unwrap();
        let state = params["state"].clone();
        std::thread::spawn(move || {
            let addr = (redirect.host_str().unwrap().to_string(), redirect.port().unwrap());
            let mut stream = std::net::TcpStream::connect(addr).unwrap();
            write!(
                stream,
                "GET {}?code=4%2Fgranted&state={} HTTP/1.1\r\nHost: localhost\r\n\r\n",
                redirect.path(),
                state
            )
            .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
        });
        Ok(())
    }

    fn request_code(&self, _url: &str) -> io::Result<String> {
        panic!("the installed-app flow never asks for a pasted code")
    }
}

/// Fails the test if the browser step is reached.
struct NoBrowser;

impl AuthorizationPrompt for NoBrowser {
    fn present_url(&self, url: &str) -> io::Result<()> {
        panic!("unexpected authorization prompt for {}", url)
    }

    fn request_code(&self, url: &str) -> io::Result<String> {
        panic!("unexpected authorization prompt for {}", url)
    }
}

#[tokio::test]
async fn test_authorize_runs_browser_flow_and_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2Fgranted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "refresh_token": "1//refresh",
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": SPREADSHEETS_SCOPE
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let credential = flow(&server, &dir).authorize("testuser", &GrantingBrowser).await.unwrap();
    assert_eq!(credential.access_token, "ya29.fresh");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    assert!(credential.has_scope(SPREADSHEETS_SCOPE));

    let stored = FileTokenStore::new(dir.path().join("google")).load("testuser").unwrap();
    assert_eq!(stored, Some(credential));
}

#[tokio::test]
async fn test_authorize_uses_valid_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let stored = StoredCredential {
        access_token: "ya29.stored".to_string(),
        refresh_token: Some("1//refresh".to_string()),
        token_type: "Bearer".to_string(),
        expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        scopes: vec![SPREADSHEETS_SCOPE.to_string()],
    };
    FileTokenStore::new(dir.path().join("google")).store("testuser", &stored).unwrap();

    let credential = flow(&server, &dir).authorize("testuser", &NoBrowser).await.unwrap();
    assert_eq!(credential, stored);
}

#[tokio::test]
async fn test_authorize_refreshes_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path().join("google"));
    let expired = StoredCredential {
        access_token: "ya29.expired".to_string(),
        refresh_token: Some("1//refresh".to_string()),
        token_type: "Bearer".to_string(),
        expires_at: Some(Utc::now() - ChronoDuration::hours(1)),
        scopes: vec![SPREADSHEETS_SCOPE.to_string()],
    };
    store.store("testuser", &expired).unwrap();

    let credential = flow(&server, &dir).authorize("testuser", &NoBrowser).await.unwrap();
    assert_eq!(credential.access_token, "ya29.refreshed");
    assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
    assert_eq!(store.load("testuser").unwrap(), Some(credential));
}

#[tokio::test]
async fn test_authorize_refresh_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path().join("google"));
    let expired = StoredCredential {
        access_token: "ya29.expired".to_string(),
        refresh_token: Some("1//revoked".to_string()),
        token_type: "Bearer".to_string(),
        expires_at: Some(Utc::now() - ChronoDuration::hours(1)),
        scopes: vec![],
    };
    store.store("testuser", &expired).unwrap();

    match flow(&server, &dir).authorize("testuser", &NoBrowser).await {
        Err(OAuthError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "invalid_grant: Token has been expired or revoked.");
        }
        other => panic!("Expected Rejected error, got {:?}", other),
    }
    // the stale credential is left untouched
    assert_eq!(store.load("testuser").unwrap(), Some(expired));
}
