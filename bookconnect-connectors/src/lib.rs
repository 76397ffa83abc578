//! The bookconnect connectors
//!
//! Each connector authenticates against one vendor API (or the quotes
//! database), performs a few calls and prints the results to a writer.

pub mod connector;
pub mod connectors;

pub use connector::{run, Connector, ConnectorError, ConnectorMetadata};
pub use connectors::{GoogleConnector, KloutConnector, LinkedInConnector, QuotesConnector, TwitterConnector};
