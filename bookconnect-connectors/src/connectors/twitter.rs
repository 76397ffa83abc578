//! Twitter connector
//!
//! Prints the id, screen name and description of the account the configured
//! access token belongs to.

use async_trait::async_trait;
use bookconnect_core::{paths, Properties};
use bookconnect_providers::twitter::{TwitterClient, TwitterConfig, TwitterService, TwitterUser};
use bookconnect_providers::{create_http_client, AuthorizationPrompt};
use std::io::Write;
use std::path::PathBuf;

use crate::connector::{resolve, Connector, ConnectorError, ConnectorMetadata};

pub const DEFAULT_ACCOUNT: &str = "directmediatips";

const USER_AGENT: &str = concat!("bookconnect/", env!("CARGO_PKG_VERSION"));

/// Prints `Current id: <id>` and `<screen name>: <description>`.
pub async fn show_current_user<S: TwitterService + ?Sized>(
    twitter: &S,
    out: &mut dyn Write,
) -> Result<TwitterUser, ConnectorError> {
    let id = twitter.current_user_id().await?;
    writeln!(out, "Current id: {}", id)?;
    let user = twitter.show_user(id).await?;
    writeln!(
        out,
        "{}: {}",
        user.screen_name,
        user.description.as_deref().unwrap_or_default()
    )?;
    Ok(user)
}

pub struct TwitterConnector {
    pub account: String,
    root: PathBuf,
}

impl Default for TwitterConnector {
    fn default() -> Self {
        Self::new(DEFAULT_ACCOUNT)
    }
}

impl TwitterConnector {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            root: PathBuf::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn config_path(&self) -> PathBuf {
        resolve(&self.root, paths::twitter(&self.account))
    }
}

#[async_trait(?Send)]
impl Connector for TwitterConnector {
    type Config = TwitterConfig;
    type Client = TwitterClient;

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: "Twitter",
            config_path: self.config_path(),
        }
    }

    fn load_config(&self) -> Result<TwitterConfig, ConnectorError> {
        let properties = Properties::load(self.config_path())?;
        Ok(TwitterConfig::from_properties(&properties)?)
    }

    async fn build_client(
        &self,
        config: TwitterConfig,
        _prompt: &dyn AuthorizationPrompt,
    ) -> Result<TwitterClient, ConnectorError> {
        Ok(TwitterClient::new(create_http_client(USER_AGENT)?, config)?)
    }

    async fn invoke(&self, twitter: TwitterClient, out: &mut dyn Write) -> Result<(), ConnectorError> {
        show_current_user(&twitter, out).await?;
        Ok(())
    }
}
