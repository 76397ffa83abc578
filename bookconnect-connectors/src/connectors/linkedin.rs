//! LinkedIn connector
//!
//! The user opens the authorization URL, pastes the resulting code back and
//! the connector prints the raw profile document of the authorizing member.

use async_trait::async_trait;
use bookconnect_core::{paths, Properties};
use bookconnect_providers::linkedin::{LinkedInAccessToken, LinkedInConfig, LinkedInService};
use bookconnect_providers::{create_http_client, AuthorizationPrompt};
use std::io::Write;
use std::path::PathBuf;

use crate::connector::{resolve, Connector, ConnectorError, ConnectorMetadata};

pub const DEFAULT_APPLICATION: &str = "directmediatips";

const USER_AGENT: &str = concat!("bookconnect/", env!("CARGO_PKG_VERSION"));

/// A service together with the token it obtained.
pub struct AuthorizedLinkedIn {
    pub service: LinkedInService,
    pub token: LinkedInAccessToken,
}

pub struct LinkedInConnector {
    pub application: String,
    root: PathBuf,
}

impl Default for LinkedInConnector {
    fn default() -> Self {
        Self::new(DEFAULT_APPLICATION)
    }
}

impl LinkedInConnector {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            root: PathBuf::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn config_path(&self) -> PathBuf {
        resolve(&self.root, paths::linkedin(&self.application))
    }
}

#[async_trait(?Send)]
impl Connector for LinkedInConnector {
    type Config = LinkedInConfig;
    type Client = AuthorizedLinkedIn;

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: "LinkedIn",
            config_path: self.config_path(),
        }
    }

    fn load_config(&self) -> Result<LinkedInConfig, ConnectorError> {
        let properties = Properties::load(self.config_path())?;
        Ok(LinkedInConfig::from_properties(&properties)?)
    }

    async fn build_client(
        &self,
        config: LinkedInConfig,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<AuthorizedLinkedIn, ConnectorError> {
        let service = LinkedInService::new(create_http_client(USER_AGENT)?, config)?;
        let token = service.authorize(prompt).await?;
        Ok(AuthorizedLinkedIn { service, token })
    }

    async fn invoke(&self, client: AuthorizedLinkedIn, out: &mut dyn Write) -> Result<(), ConnectorError> {
        let body = client.service.fetch_profile(&client.token).await?;
        writeln!(out, "{}", body)?;
        Ok(())
    }
}
