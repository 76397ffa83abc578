//! Twitter REST 1.1 client signed with static OAuth 1.0a tokens

use async_trait::async_trait;
use bookconnect_core::{redact_sensitive_data, ConfigError, Properties};
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::http::{read_text, HttpError};
use crate::oauth1::{authorization_header, OAuth1Credentials};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1/";

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("Failed to sign request: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for TwitterError {
    fn from(e: reqwest::Error) -> Self {
        TwitterError::Http(HttpError::Transport(e))
    }
}

impl From<url::ParseError> for TwitterError {
    fn from(e: url::ParseError) -> Self {
        TwitterError::Http(HttpError::Url(e))
    }
}

/// Account settings from `twitter/<account>.properties`.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub credentials: OAuth1Credentials,
    /// Logs every request and response body at info level
    pub debug: bool,
}

impl TwitterConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        Ok(Self {
            credentials: OAuth1Credentials {
                consumer_key: properties.require("oauth.consumerKey")?.to_string(),
                consumer_secret: properties.require("oauth.consumerSecret")?.to_string(),
                access_token: properties.require("oauth.accessToken")?.to_string(),
                access_token_secret: properties.require("oauth.accessTokenSecret")?.to_string(),
            },
            debug: properties.flag("debug"),
        })
    }

    /// User id embedded in an access token of the form `<id>-<secret part>`.
    pub fn user_id_from_access_token(&self) -> Option<u64> {
        self.credentials
            .access_token
            .split_once('-')
            .and_then(|(id, _)| id.parse().ok())
    }
}

/// The subset of the user object the connector prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: u64,
    pub screen_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[async_trait]
pub trait TwitterService {
    /// Numeric id of the authenticating user.
    async fn current_user_id(&self) -> Result<u64, TwitterError>;

    async fn show_user(&self, user_id: u64) -> Result<TwitterUser, TwitterError>;
}

pub struct TwitterClient {
    client: Client,
    config: TwitterConfig,
    base_url: Url,
}

impl TwitterClient {
    pub fn new(client: Client, config: TwitterConfig) -> Result<Self, TwitterError> {
        Self::with_base_url(client, config, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        client: Client,
        config: TwitterConfig,
        base_url: &str,
    ) -> Result<Self, TwitterError> {
        Ok(Self {
            client,
            config,
            base_url: Url::parse(base_url)?,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TwitterError> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let header = authorization_header(
            &self.config.credentials,
            "GET",
            &url,
            &[],
            &Uuid::new_v4().simple().to_string(),
            Utc::now().timestamp(),
        )
        .map_err(|e| TwitterError::Signing(e.to_string()))?;

        if self.config.debug {
            info!("GET {}", url);
        } else {
            debug!("GET {}", url);
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;
        let body = read_text(response).await?;

        if self.config.debug {
            info!("Response: {}", redact_sensitive_data(&body));
        }

        serde_json::from_str(&body).map_err(|e| TwitterError::Http(HttpError::Decode(e.to_string())))
    }

    #[instrument(skip(self))]
    pub async fn verify_credentials(&self) -> Result<TwitterUser, TwitterError> {
        self.get("account/verify_credentials.json", &[]).await
    }
}

#[async_trait]
impl TwitterService for TwitterClient {
    async fn current_user_id(&self) -> Result<u64, TwitterError> {
        if let Some(id) = self.config.user_id_from_access_token() {
            debug!("User id {} taken from the access token", id);
            return Ok(id);
        }
        Ok(self.verify_credentials().await?.id)
    }

    #[instrument(skip(self))]
    async fn show_user(&self, user_id: u64) -> Result<TwitterUser, TwitterError> {
        self.get("users/show.json", &[("user_id", user_id.to_string())])
            .await
    }
}
