//! Vendor API clients for the bookconnect connectors
//!
//! One module per vendor plus the two OAuth flavours they use. Every client
//! takes its `reqwest::Client` from the caller and exposes its calls through
//! an async trait, so the connectors can be exercised against fakes.

pub mod http;
pub mod klout;
pub mod linkedin;
pub mod oauth1;
pub mod oauth2;
pub mod sheets;
pub mod twitter;

pub use http::{create_http_client, HttpError};
pub use klout::{KloutClient, KloutError, KloutService, Network, UserId};
pub use linkedin::{LinkedInAccessToken, LinkedInConfig, LinkedInError, LinkedInService};
pub use oauth1::OAuth1Credentials;
pub use oauth2::{AuthorizationCodeFlow, AuthorizationPrompt, LocalServerReceiver, OAuthError};
pub use sheets::{update_cell_request, BatchUpdateRequest, SheetsClient, SheetsError, SpreadsheetService};
pub use twitter::{TwitterClient, TwitterConfig, TwitterError, TwitterService, TwitterUser};

/// Common traits and types used across connectors
pub mod prelude {
    pub use super::klout::{Influence, KloutService, Network, Topic, User, UserId};
    pub use super::oauth2::{AuthorizationPrompt, SPREADSHEETS_SCOPE};
    pub use super::sheets::{SpreadsheetService, ValueRange};
    pub use super::twitter::{TwitterService, TwitterUser};
    pub use super::HttpError;
}
