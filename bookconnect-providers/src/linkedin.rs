//! LinkedIn OAuth 2.0 service and profile query
//!
//! LinkedIn redirects to a registered callback URL the connector does not
//! serve, so the code is pasted back by the user through an
//! [`AuthorizationPrompt`]. Signed requests carry the access token as the
//! `oauth2_access_token` query parameter.

use bookconnect_core::{ConfigError, Properties};
use reqwest::Client;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::{extract_error_message, HttpError};
use crate::oauth2::{exchange_authorization_code, generate_state, AuthorizationPrompt, OAuthError};

pub const DEFAULT_AUTHORIZATION_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
pub const DEFAULT_TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
pub const DEFAULT_API_BASE_URL: &str = "https://api.linkedin.com/";

/// Profile fields requested by [`LinkedInService::fetch_profile`]
pub const PROFILE_PATH: &str = "v1/people/~:(id,first-name,last-name,headline,location,email-address)";

const ACCESS_TOKEN_PARAM: &str = "oauth2_access_token";

#[derive(Debug, Error)]
pub enum LinkedInError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl From<reqwest::Error> for LinkedInError {
    fn from(e: reqwest::Error) -> Self {
        LinkedInError::Http(HttpError::Transport(e))
    }
}

impl From<url::ParseError> for LinkedInError {
    fn from(e: url::ParseError) -> Self {
        LinkedInError::Http(HttpError::Url(e))
    }
}

/// Application credentials from `linkedin/<application>.properties`.
#[derive(Clone)]
pub struct LinkedInConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Space separated scope list
    pub permissions: String,
    pub redirect_url: String,
}

impl fmt::Debug for LinkedInConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***REDACTED***")
            .field("permissions", &self.permissions)
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

impl LinkedInConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: properties.require("ClientID")?.to_string(),
            client_secret: properties.require("ClientSecret")?.to_string(),
            permissions: properties.require("Permissions")?.to_string(),
            redirect_url: properties.require("Redirect_URL1")?.to_string(),
        })
    }
}

/// An OAuth 2.0 access token issued by LinkedIn.
#[derive(Clone)]
pub struct LinkedInAccessToken {
    pub token: String,
    pub expires_in: Option<i64>,
}

impl fmt::Debug for LinkedInAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInAccessToken")
            .field("token", &"***REDACTED***")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// OAuth 2.0 service descriptor for one LinkedIn application.
pub struct LinkedInService {
    client: Client,
    config: LinkedInConfig,
    authorization_url: Url,
    token_url: String,
    api_base_url: Url,
}

impl LinkedInService {
    pub fn new(client: Client, config: LinkedInConfig) -> Result<Self, LinkedInError> {
        Self::with_endpoints(
            client,
            config,
            DEFAULT_AUTHORIZATION_URL,
            DEFAULT_TOKEN_URL,
            DEFAULT_API_BASE_URL,
        )
    }

    pub fn with_endpoints(
        client: Client,
        config: LinkedInConfig,
        authorization_url: &str,
        token_url: &str,
        api_base_url: &str,
    ) -> Result<Self, LinkedInError> {
        Ok(Self {
            client,
            config,
            authorization_url: Url::parse(authorization_url)?,
            token_url: Url::parse(token_url)?.to_string(),
            api_base_url: Url::parse(api_base_url)?,
        })
    }

    pub fn config(&self) -> &LinkedInConfig {
        &self.config
    }

    /// The URL the user opens to grant access.
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.authorization_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", &self.config.permissions)
            .append_pair("state", state);
        url
    }

    #[instrument(skip(self, code))]
    pub async fn access_token(&self, code: &str) -> Result<LinkedInAccessToken, LinkedInError> {
        let response = exchange_authorization_code(
            &self.client,
            &self.token_url,
            &self.config.client_id,
            &self.config.client_secret,
            code.trim(),
            &self.config.redirect_url,
        )
        .await?;

        info!("Obtained LinkedIn access token");
        Ok(LinkedInAccessToken {
            token: response.access_token,
            expires_in: response.expires_in,
        })
    }

    /// Shows the authorization URL, takes the pasted code and exchanges it.
    pub async fn authorize(
        &self,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<LinkedInAccessToken, LinkedInError> {
        let url = self.authorization_url(&generate_state());
        let code = prompt.request_code(url.as_str()).map_err(OAuthError::from)?;
        self.access_token(&code).await
    }

    /// Raw profile document of the authorizing member. The body is returned
    /// whatever the status, so a LinkedIn error document is printed as is.
    #[instrument(skip(self, token))]
    pub async fn fetch_profile(&self, token: &LinkedInAccessToken) -> Result<String, LinkedInError> {
        let url = self.api_base_url.join(PROFILE_PATH)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(&[(ACCESS_TOKEN_PARAM, token.token.as_str())])
            .header("x-li-format", "xml")
            .header("Accept-Language", "en")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("LinkedIn answered {}: {}", status, extract_error_message(&body, status));
        }
        Ok(body)
    }
}
