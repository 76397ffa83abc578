//! Klout v2 REST client
//!
//! Every request carries the application key as the `key` query parameter.
//! Users are addressed by their Klout id; the identity endpoints translate
//! between Klout ids and ids on the networks Klout scores.

use async_trait::async_trait;
use bookconnect_core::{ConfigError, Properties};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::http::{read_json, HttpError};

pub const DEFAULT_BASE_URL: &str = "https://api.klout.com/v2/";

#[derive(Debug, Error)]
pub enum KloutError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl From<reqwest::Error> for KloutError {
    fn from(e: reqwest::Error) -> Self {
        KloutError::Http(HttpError::Transport(e))
    }
}

impl From<url::ParseError> for KloutError {
    fn from(e: url::ParseError) -> Self {
        KloutError::Http(HttpError::Url(e))
    }
}

/// Networks Klout knows identities on, by their short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "ks")]
    Klout,
    #[serde(rename = "tw")]
    Twitter,
    #[serde(rename = "gp")]
    GooglePlus,
    #[serde(rename = "ig")]
    Instagram,
}

impl Network {
    pub fn code(&self) -> &'static str {
        match self {
            Network::Klout => "ks",
            Network::Twitter => "tw",
            Network::GooglePlus => "gp",
            Network::Instagram => "ig",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An id on one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    pub id: String,
    pub network: Network,
}

impl UserId {
    pub fn klout(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network: Network::Klout,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.network)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub score: f64,
    /// Range label such as `"50-59"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDeltas {
    #[serde(default)]
    pub day_change: f64,
    #[serde(default)]
    pub week_change: f64,
    #[serde(default)]
    pub month_change: f64,
}

/// `user.json/<klout id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub klout_id: String,
    pub nick: String,
    pub score: Score,
    #[serde(default)]
    pub score_deltas: Option<ScoreDeltas>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Klout id {}): score {}", self.nick, self.klout_id, self.score.score)?;
        if let Some(deltas) = &self.score_deltas {
            write!(
                f,
                " (day {:+}, week {:+}, month {:+})",
                deltas.day_change, deltas.week_change, deltas.month_change
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluencePayload {
    pub klout_id: String,
    pub nick: String,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceEntity {
    #[serde(default)]
    pub id: Option<String>,
    pub payload: InfluencePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceItem {
    pub entity: InfluenceEntity,
}

impl InfluenceItem {
    pub fn nick(&self) -> &str {
        &self.entity.payload.nick
    }

    pub fn score(&self) -> f64 {
        self.entity.payload.score.score
    }
}

/// `user.json/<klout id>/influence`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Influence {
    #[serde(default)]
    pub my_influencers: Vec<InfluenceItem>,
    #[serde(default)]
    pub my_influencees: Vec<InfluenceItem>,
}

/// One entry of `user.json/<klout id>/topics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default)]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[async_trait]
pub trait KloutService {
    /// Klout id of a Twitter screen name
    async fn user_id_from_twitter_screen_name(&self, screen_name: &str) -> Result<UserId, KloutError>;

    /// Id on `network` of the user behind a Klout id
    async fn user_id_on_network(&self, klout_id: &UserId, network: Network) -> Result<UserId, KloutError>;

    /// Klout id of the user behind a network id. Klout ids map to themselves.
    async fn klout_user_id(&self, network_id: &UserId) -> Result<UserId, KloutError>;

    async fn user(&self, klout_id: &UserId) -> Result<User, KloutError>;

    async fn influence(&self, klout_id: &UserId) -> Result<Influence, KloutError>;

    async fn topics(&self, klout_id: &UserId) -> Result<Vec<Topic>, KloutError>;
}

/// Klout client bound to one API key.
pub struct KloutClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for KloutClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KloutClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***REDACTED***")
            .finish()
    }
}

impl KloutClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Result<Self, KloutError> {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        client: Client,
        api_key: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, KloutError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
        })
    }

    /// Reads `apiKey` from the Klout properties file.
    pub fn from_properties(client: Client, properties: &Properties) -> Result<Self, KloutError> {
        Self::new(client, properties.require("apiKey")?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, KloutError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HttpError::Decode(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        Ok(read_json(response).await?)
    }
}

#[async_trait]
impl KloutService for KloutClient {
    #[instrument(skip(self))]
    async fn user_id_from_twitter_screen_name(&self, screen_name: &str) -> Result<UserId, KloutError> {
        self.get(&["identity.json", "twitter"], &[("screenName", screen_name)])
            .await
    }

    #[instrument(skip(self))]
    async fn user_id_on_network(&self, klout_id: &UserId, network: Network) -> Result<UserId, KloutError> {
        self.get(&["identity.json", "klout", &klout_id.id, network.code()], &[])
            .await
    }

    #[instrument(skip(self))]
    async fn klout_user_id(&self, network_id: &UserId) -> Result<UserId, KloutError> {
        if network_id.network == Network::Klout {
            return Ok(network_id.clone());
        }
        self.get(&["identity.json", network_id.network.code(), &network_id.id], &[])
            .await
    }

    async fn user(&self, klout_id: &UserId) -> Result<User, KloutError> {
        self.get(&["user.json", &klout_id.id], &[]).await
    }

    async fn influence(&self, klout_id: &UserId) -> Result<Influence, KloutError> {
        self.get(&["user.json", &klout_id.id, "influence"], &[]).await
    }

    async fn topics(&self, klout_id: &UserId) -> Result<Vec<Topic>, KloutError> {
        self.get(&["user.json", &klout_id.id, "topics"], &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_deserialize() {
        let id: UserId = serde_json::from_value(json!({"id": "635263", "network": "ks"})).unwrap();
        assert_eq!(id, UserId::klout("635263"));
        assert_eq!(id.to_string(), "635263 (ks)");

        let id: UserId = serde_json::from_value(json!({"id": "15639238", "network": "tw"})).unwrap();
        assert_eq!(id.network, Network::Twitter);
    }

    #[test]
    fn test_unknown_network_rejected() {
        let result = serde_json::from_value::<UserId>(json!({"id": "1", "network": "fb"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_user_display() {
        let user: User = serde_json::from_value(json!({
            "kloutId": "635263",
            "nick": "bruno1970",
            "score": {"score": 56.5, "bucket": "50-59"},
            "scoreDeltas": {"dayChange": 0.25, "weekChange": -1.5, "monthChange": 2.0}
        }))
        .unwrap();
        assert_eq!(user.score.bucket.as_deref(), Some("50-59"));
        assert_eq!(
            user.to_string(),
            "bruno1970 (Klout id 635263): score 56.5 (day +0.25, week -1.5, month +2)"
        );
    }

    #[test]
    fn test_influence_deserialize() {
        let influence: Influence = serde_json::from_value(json!({
            "myInfluencers": [
                {"entity": {"id": "1", "payload": {"kloutId": "1", "nick": "itext", "score": {"score": 61.2}}}}
            ],
            "myInfluencersCount": 1,
            "myInfluenceesCount": 0
        }))
        .unwrap();
        assert_eq!(influence.my_influencers.len(), 1);
        assert_eq!(influence.my_influencers[0].nick(), "itext");
        assert_eq!(influence.my_influencers[0].score(), 61.2);
        assert!(influence.my_influencees.is_empty());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = KloutClient::new(Client::new(), "supersecretkey").unwrap();
        assert!(!format!("{:?}", client).contains("supersecretkey"));
    }
}
