//! Connector implementations, one per vendor

pub mod google;
pub mod klout;
pub mod linkedin;
pub mod quotes;
pub mod twitter;

pub use google::GoogleConnector;
pub use klout::KloutConnector;
pub use linkedin::LinkedInConnector;
pub use quotes::QuotesConnector;
pub use twitter::TwitterConnector;
