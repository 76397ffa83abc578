//! Core functionality for the bookconnect connectors
//!
//! Configuration file loading, the file-backed OAuth token store, credential
//! redaction for logs and the quotes database connection.

pub mod config;
pub mod database;
pub mod secure_logging;
pub mod token_store;

pub use config::{paths, ClientSecrets, ConfigError, Properties};
pub use database::{DatabaseConfig, DatabaseConnection, DatabaseError, Quote, QuoteSource, QUOTES_QUERY};
pub use secure_logging::{init_logging, is_sensitive_field, redact_sensitive_data};
pub use token_store::{FileTokenStore, StoreError, StoredCredential};

/// Re-export common types used throughout the workspace
pub mod prelude {
    pub use super::config::{paths, ClientSecrets, ConfigError, Properties};
    pub use super::database::{DatabaseConfig, DatabaseConnection, DatabaseError, Quote, QuoteSource};
    pub use super::secure_logging::redact_sensitive_data;
    pub use super::token_store::{FileTokenStore, StoreError, StoredCredential};
    pub use chrono::{DateTime, Utc};
}
