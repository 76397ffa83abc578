//! OAuth 2.0 authorization-code flows
//!
//! Google uses the installed-application variant: a throwaway HTTP listener
//! on the loopback interface receives the browser redirect, the code is
//! exchanged at the token endpoint and the resulting credential is persisted
//! in a [`FileTokenStore`] so later runs skip the browser. LinkedIn shares the
//! token exchange but obtains its code through [`AuthorizationPrompt`].

use bookconnect_core::{
    redact_sensitive_data, ClientSecrets, ConfigError, FileTokenStore, StoreError,
    StoredCredential,
};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::extract_error_message;

/// Read/write access to spreadsheets
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Path the local receiver answers on
pub const CALLBACK_PATH: &str = "/Callback";

pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// How long one connection may take to send its request head. Browsers open
/// speculative connections that never send anything.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid authorization callback: {0}")]
    Callback(String),
    #[error("Callback receiver I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Authorization callback state does not match the request")]
    StateMismatch,
    #[error("Authorization denied: {0}")]
    Denied(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unexpected token response: {0}")]
    Decode(String),
    #[error("No authorization callback received within {0} seconds")]
    Timeout(u64),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// The interactive step of an authorization-code flow.
///
/// Implementations talk to whoever runs the connector; tests answer with
/// canned values.
pub trait AuthorizationPrompt {
    /// Shows a URL the user must open. The redirect comes back to a local
    /// receiver, so nothing is read.
    fn present_url(&self, url: &str) -> io::Result<()>;

    /// Shows a URL and returns the authorization code the user pastes back.
    fn request_code(&self, url: &str) -> io::Result<String>;
}

/// Token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Converts to the persisted form. A refresh response usually omits the
    /// refresh token, in which case `previous_refresh_token` is kept.
    pub fn into_credential(
        self,
        requested_scopes: &[String],
        previous_refresh_token: Option<String>,
    ) -> StoredCredential {
        let scopes = match self.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        StoredCredential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            // An expiry too far out to represent is recorded as none
            expires_at: self
                .expires_in
                .and_then(ChronoDuration::try_seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime)),
            scopes,
        }
    }
}

/// POSTs a form to a token endpoint and decodes the token response.
pub async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, OAuthError> {
    debug!("POST {}", token_uri);
    let response = client
        .post(token_uri)
        .header("Accept", "application/json")
        .form(params)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    debug!("Token endpoint answered {}: {}", status, redact_sensitive_data(&body));

    if !status.is_success() {
        return Err(OAuthError::Rejected {
            status: status.as_u16(),
            body: extract_error_message(&body, status),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        OAuthError::Decode(format!("{} (body: {})", e, redact_sensitive_data(&body)))
    })
}

/// `grant_type=authorization_code` exchange shared by Google and LinkedIn.
pub async fn exchange_authorization_code(
    client: &Client,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, OAuthError> {
    request_token(
        client,
        token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ],
    )
    .await
}

/// Random value tying a callback to the request that started the flow.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// What a single request to the local receiver carried.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackRequest {
    /// Anything other than a GET on the callback path
    Other,
    Code { code: String, state: Option<String> },
    Error { error: String, description: Option<String> },
    Empty,
}

fn parse_request_line(line: &str) -> CallbackRequest {
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return CallbackRequest::Other;
    };
    if !method.eq_ignore_ascii_case("GET") {
        return CallbackRequest::Other;
    }

    let Ok(url) = Url::parse(&format!("http://127.0.0.1{}", target)) else {
        return CallbackRequest::Other;
    };
    if url.path() != CALLBACK_PATH {
        return CallbackRequest::Other;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    match (error, code) {
        (Some(error), _) => CallbackRequest::Error { error, description },
        (None, Some(code)) => CallbackRequest::Code { code, state },
        (None, None) => CallbackRequest::Empty,
    }
}

fn html_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>OAuth 2.0 Authentication</title></head>\
         <body><p>{}</p></body></html>",
        message
    )
}

async fn send_response(stream: &mut TcpStream, status: &str, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

/// Reads the request line, then the headers to the end so closing the
/// socket does not reset it.
async fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut header = String::new();
    while reader.read_line(&mut header).await? > 0 && !header.trim().is_empty() {
        header.clear();
    }
    Ok(request_line)
}

/// One-shot HTTP receiver for the authorization redirect.
pub struct LocalServerReceiver {
    listener: TcpListener,
    redirect_uri: String,
    timeout: Duration,
    request_timeout: Duration,
}

impl LocalServerReceiver {
    /// Binds an ephemeral port on 127.0.0.1.
    pub async fn bind() -> Result<Self, OAuthError> {
        Self::bind_to(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await
    }

    pub async fn bind_to(addr: SocketAddr) -> Result<Self, OAuthError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let redirect_uri = format!("http://{}{}", local_addr, CALLBACK_PATH);
        info!("OAuth callback receiver listening on {}", redirect_uri);

        Ok(Self {
            listener,
            redirect_uri,
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until one carries a code or an error, then stops
    /// listening.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String, OAuthError> {
        let seconds = self.timeout.as_secs();
        tokio::time::timeout(self.timeout, self.accept_callbacks(expected_state))
            .await
            .map_err(|_| OAuthError::Timeout(seconds))?
    }

    async fn accept_callbacks(&self, expected_state: &str) -> Result<String, OAuthError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let request_line =
                match tokio::time::timeout(self.request_timeout, read_request_head(&mut stream)).await {
                    Ok(Ok(line)) => line,
                    Ok(Err(e)) => {
                        debug!("Dropping connection from {}: {}", peer, e);
                        continue;
                    }
                    Err(_) => {
                        debug!("Dropping idle connection from {}", peer);
                        continue;
                    }
                };
            if request_line.trim().is_empty() {
                debug!("Connection from {} closed without a request", peer);
                continue;
            }
            debug!("Callback request from {}: {}", peer, redact_sensitive_data(request_line.trim_end()));

            match parse_request_line(&request_line) {
                CallbackRequest::Other => {
                    if let Err(e) = send_response(&mut stream, "404 Not Found", &html_page("Not found.")).await {
                        debug!("Could not answer {}: {}", peer, e);
                    }
                }
                CallbackRequest::Code { code, state } => {
                    if state.as_deref() != Some(expected_state) {
                        warn!("Discarding callback with mismatched state");
                        send_response(
                            &mut stream,
                            "400 Bad Request",
                            &html_page("Invalid state parameter. Please start the authorization again."),
                        )
                        .await?;
                        return Err(OAuthError::StateMismatch);
                    }
                    send_response(
                        &mut stream,
                        "200 OK",
                        &html_page("Received verification code. You may now close this window."),
                    )
                    .await?;
                    return Ok(code);
                }
                CallbackRequest::Error { error, description } => {
                    let reason = match description {
                        Some(description) => format!("{}: {}", error, description),
                        None => error,
                    };
                    send_response(
                        &mut stream,
                        "200 OK",
                        &html_page("Authorization was not granted. You may now close this window."),
                    )
                    .await?;
                    return Err(OAuthError::Denied(reason));
                }
                CallbackRequest::Empty => {
                    send_response(
                        &mut stream,
                        "400 Bad Request",
                        &html_page("Missing authorization code."),
                    )
                    .await?;
                    return Err(OAuthError::Callback(
                        "redirect carried neither a code nor an error".to_string(),
                    ));
                }
            }
        }
    }
}

/// Installed-application authorization-code flow with a persistent token
/// store.
pub struct AuthorizationCodeFlow {
    client: Client,
    secrets: ClientSecrets,
    scopes: Vec<String>,
    store: FileTokenStore,
    callback_timeout: Duration,
}

impl AuthorizationCodeFlow {
    pub fn new(
        client: Client,
        secrets: ClientSecrets,
        scopes: Vec<String>,
        store: FileTokenStore,
    ) -> Self {
        Self {
            client,
            secrets,
            scopes,
            store,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Authorization URL requesting offline access, so a refresh token is
    /// issued alongside the access token.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, OAuthError> {
        let mut url = Url::parse(&self.secrets.auth_uri)?;
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredCredential, OAuthError> {
        let response = exchange_authorization_code(
            &self.client,
            &self.secrets.token_uri,
            &self.secrets.client_id,
            &self.secrets.client_secret,
            code,
            redirect_uri,
        )
        .await?;
        Ok(response.into_credential(&self.scopes, None))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredCredential, OAuthError> {
        let response = request_token(
            &self.client,
            &self.secrets.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.secrets.client_id),
                ("client_secret", &self.secrets.client_secret),
            ],
        )
        .await?;
        Ok(response.into_credential(&self.scopes, Some(refresh_token.to_string())))
    }

    /// Returns a usable credential for `user_id`: the stored one while it is
    /// valid, a refreshed one once it has expired, otherwise a new one from
    /// the browser flow. New and refreshed credentials are stored.
    #[instrument(skip(self, prompt))]
    pub async fn authorize(
        &self,
        user_id: &str,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<StoredCredential, OAuthError> {
        if let Some(stored) = self.store.load(user_id)? {
            if !stored.is_expired() {
                debug!("Using stored credential for {}", user_id);
                return Ok(stored);
            }
            if let Some(refresh_token) = stored.refresh_token.as_deref() {
                info!("Stored credential for {} expired, refreshing", user_id);
                let refreshed = self.refresh(refresh_token).await?;
                self.store.store(user_id, &refreshed)?;
                return Ok(refreshed);
            }
            info!("Stored credential for {} expired without a refresh token", user_id);
        }

        let receiver = LocalServerReceiver::bind()
            .await?
            .with_timeout(self.callback_timeout);
        let redirect_uri = receiver.redirect_uri().to_string();
        let state = generate_state();
        let url = self.authorization_url(&redirect_uri, &state)?;

        prompt.present_url(url.as_str())?;
        let code = receiver.wait_for_code(&state).await?;
        info!("Received authorization code, exchanging it for tokens");

        let credential = self.exchange_code(&code, &redirect_uri).await?;
        self.store.store(user_id, &credential)?;
        Ok(credential)
    }
}
