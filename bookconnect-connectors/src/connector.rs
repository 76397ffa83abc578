//! The connector pattern
//!
//! Every connector runs the same three stages strictly in order: load its
//! configuration file, build an authenticated client from it, then invoke
//! the vendor and print what comes back. A failure in any stage ends the run.

use async_trait::async_trait;
use bookconnect_core::{ConfigError, DatabaseError, StoreError};
use bookconnect_providers::{
    AuthorizationPrompt, HttpError, KloutError, LinkedInError, OAuthError, SheetsError, TwitterError,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Klout(#[from] KloutError),
    #[error(transparent)]
    LinkedIn(#[from] LinkedInError),
    #[error(transparent)]
    Twitter(#[from] TwitterError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Connector metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorMetadata {
    pub name: &'static str,
    /// Configuration file, relative to the connector's working directory
    pub config_path: PathBuf,
}

/// Base trait for all connectors.
///
/// Futures are not required to be `Send`: the prompt is an interactive,
/// single-threaded object and every run happens on one thread.
#[async_trait(?Send)]
pub trait Connector {
    type Config;
    type Client;

    fn metadata(&self) -> ConnectorMetadata;

    /// Reads the configuration file. Never touches the network.
    fn load_config(&self) -> Result<Self::Config, ConnectorError>;

    /// Builds the authenticated client, running any handshake the vendor
    /// requires.
    async fn build_client(
        &self,
        config: Self::Config,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<Self::Client, ConnectorError>;

    /// Issues the calls and prints the results.
    async fn invoke(&self, client: Self::Client, out: &mut dyn Write) -> Result<(), ConnectorError>;
}

/// Runs the three stages of a connector in order.
pub async fn run<C: Connector + ?Sized>(
    connector: &C,
    prompt: &dyn AuthorizationPrompt,
    out: &mut dyn Write,
) -> Result<(), ConnectorError> {
    let metadata = connector.metadata();
    info!("Running {} connector", metadata.name);

    debug!("Loading configuration from {}", metadata.config_path.display());
    let config = connector.load_config()?;

    let client = connector.build_client(config, prompt).await?;
    debug!("{} client ready", metadata.name);

    connector.invoke(client, out).await?;
    out.flush()?;
    info!("{} connector finished", metadata.name);
    Ok(())
}

/// Resolves a fixed relative configuration path against a working
/// directory. An empty root leaves the path relative to the process.
pub(crate) fn resolve(root: &Path, relative: impl AsRef<Path>) -> PathBuf {
    if root.as_os_str().is_empty() {
        relative.as_ref().to_path_buf()
    } else {
        root.join(relative)
    }
}
