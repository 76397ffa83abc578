//! Quotes database access
//!
//! A single PostgreSQL connection built from `database/database.properties`
//! (`url`, `user`, `password`). The connection is opened for one query and
//! closed explicitly afterwards.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, instrument};

use crate::config::{ConfigError, Properties};
use crate::secure_logging::redact_sensitive_data;

/// The query behind the quotes connector
pub const QUOTES_QUERY: &str = "SELECT quote, author FROM directmediatips_quotes";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid database url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tokio_postgres::Error,
    },
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("Connection task failed: {0}")]
    Connection(#[from] tokio::task::JoinError),
}

/// Connection settings for the quotes database.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact_sensitive_data(&self.url))
            .field("user", &self.user)
            .field("password", &"***REDACTED***")
            .finish()
    }
}

impl DatabaseConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_properties(&Properties::load(path)?)
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        Ok(Self {
            url: properties.require("url")?.to_string(),
            user: properties.require("user")?.to_string(),
            password: properties.require("password")?.to_string(),
        })
    }

    /// Builds the driver configuration. JDBC-style `jdbc:postgresql://` urls
    /// are accepted alongside plain `postgres://` ones.
    pub fn pg_config(&self) -> Result<tokio_postgres::Config, DatabaseError> {
        let url = self.url.strip_prefix("jdbc:").unwrap_or(&self.url);
        let mut config =
            tokio_postgres::Config::from_str(url).map_err(|source| DatabaseError::InvalidUrl {
                url: redact_sensitive_data(&self.url),
                source,
            })?;
        config.user(&self.user).password(&self.password);
        Ok(config)
    }
}

/// One row of the quotes table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub quote: String,
    pub author: String,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" - {}", self.quote, self.author)
    }
}

#[async_trait]
pub trait QuoteSource {
    /// All quotes in result-set order.
    async fn quotes(&self) -> Result<Vec<Quote>, DatabaseError>;
}

/// An open connection to the quotes database.
pub struct DatabaseConnection {
    client: Client,
    connection: JoinHandle<Result<(), tokio_postgres::Error>>,
}

impl DatabaseConnection {
    #[instrument(skip(config), fields(user = %config.user))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pg_config = config.pg_config()?;
        let (client, connection) = pg_config.connect(NoTls).await?;
        let connection = tokio::spawn(async move {
            let result = connection.await;
            if let Err(e) = &result {
                error!("Database connection error: {}", e);
            }
            result
        });

        info!("Connected to {}", redact_sensitive_data(&config.url));
        Ok(Self { client, connection })
    }

    pub async fn execute(&self, query: &str) -> Result<Vec<tokio_postgres::Row>, DatabaseError> {
        debug!("Executing query: {}", query);
        Ok(self.client.query(query, &[]).await?)
    }

    /// Drops the client and waits for the connection task to finish.
    pub async fn close(self) -> Result<(), DatabaseError> {
        drop(self.client);
        self.connection.await??;
        debug!("Database connection closed");
        Ok(())
    }
}

#[async_trait]
impl QuoteSource for DatabaseConnection {
    async fn quotes(&self) -> Result<Vec<Quote>, DatabaseError> {
        let rows = self.execute(QUOTES_QUERY).await?;
        let mut quotes = Vec::with_capacity(rows.len());
        for row in rows {
            let quote: Option<String> = row.try_get("quote")?;
            let author: Option<String> = row.try_get("author")?;
            quotes.push(Quote {
                quote: quote.unwrap_or_default(),
                author: author.unwrap_or_default(),
            });
        }
        Ok(quotes)
    }
}
