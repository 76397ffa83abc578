//! Quotes connector
//!
//! Prints every row of the quotes table as `"<quote>" - <author>`.

use async_trait::async_trait;
use bookconnect_core::{paths, DatabaseConfig, DatabaseConnection, QuoteSource};
use bookconnect_providers::AuthorizationPrompt;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::connector::{resolve, Connector, ConnectorError, ConnectorMetadata};

/// Prints the quotes in result order and returns how many there were.
pub async fn show_quotes<S: QuoteSource + ?Sized>(
    source: &S,
    out: &mut dyn Write,
) -> Result<usize, ConnectorError> {
    let quotes = source.quotes().await?;
    for quote in &quotes {
        writeln!(out, "{}", quote)?;
    }
    Ok(quotes.len())
}

#[derive(Default)]
pub struct QuotesConnector {
    root: PathBuf,
}

impl QuotesConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

#[async_trait(?Send)]
impl Connector for QuotesConnector {
    type Config = DatabaseConfig;
    type Client = DatabaseConnection;

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: "Quotes",
            config_path: resolve(&self.root, paths::database()),
        }
    }

    fn load_config(&self) -> Result<DatabaseConfig, ConnectorError> {
        Ok(DatabaseConfig::load(resolve(&self.root, paths::database()))?)
    }

    async fn build_client(
        &self,
        config: DatabaseConfig,
        _prompt: &dyn AuthorizationPrompt,
    ) -> Result<DatabaseConnection, ConnectorError> {
        Ok(DatabaseConnection::connect(&config).await?)
    }

    async fn invoke(&self, connection: DatabaseConnection, out: &mut dyn Write) -> Result<(), ConnectorError> {
        let printed = show_quotes(&connection, out).await;
        // The connection is closed even when the query failed
        let closed = connection.close().await;
        let count = printed?;
        closed?;
        info!("Printed {} quotes", count);
        Ok(())
    }
}
