//! Klout connector
//!
//! Resolves a Twitter screen name to a Klout id and back through the Twitter
//! network id, then prints the user, their influence graph and their topics.

use async_trait::async_trait;
use bookconnect_core::{paths, Properties};
use bookconnect_providers::klout::{KloutClient, KloutService, Network, UserId};
use bookconnect_providers::{create_http_client, AuthorizationPrompt};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::connector::{resolve, Connector, ConnectorError, ConnectorMetadata};

pub const DEFAULT_SCREEN_NAME: &str = "bruno1970";

const USER_AGENT: &str = concat!("bookconnect/", env!("CARGO_PKG_VERSION"));

/// Screen name to Klout id, Klout id to Twitter id, Twitter id back to the
/// canonical Klout id. Each id is printed as it is resolved.
pub async fn resolve_user_id<S: KloutService + ?Sized>(
    klout: &S,
    screen_name: &str,
    out: &mut dyn Write,
) -> Result<UserId, ConnectorError> {
    let id = klout.user_id_from_twitter_screen_name(screen_name).await?;
    writeln!(out, "{}", id)?;
    let id = klout.user_id_on_network(&id, Network::Twitter).await?;
    writeln!(out, "{}", id)?;
    let id = klout.klout_user_id(&id).await?;
    writeln!(out, "{}", id)?;
    writeln!(out)?;
    Ok(id)
}

pub async fn show_user<S: KloutService + ?Sized>(
    klout: &S,
    id: &UserId,
    out: &mut dyn Write,
) -> Result<(), ConnectorError> {
    let user = klout.user(id).await?;
    writeln!(out, "{}", user)?;
    writeln!(out)?;
    Ok(())
}

pub async fn show_influence<S: KloutService + ?Sized>(
    klout: &S,
    id: &UserId,
    out: &mut dyn Write,
) -> Result<(), ConnectorError> {
    let influence = klout.influence(id).await?;
    writeln!(out, "Influencers:")?;
    for item in &influence.my_influencers {
        writeln!(out, "{}: {}", item.nick(), item.score())?;
    }
    writeln!(out)?;
    writeln!(out, "Influencees:")?;
    for item in &influence.my_influencees {
        writeln!(out, "{}: {}", item.nick(), item.score())?;
    }
    writeln!(out)?;
    Ok(())
}

pub async fn show_topics<S: KloutService + ?Sized>(
    klout: &S,
    id: &UserId,
    out: &mut dyn Write,
) -> Result<(), ConnectorError> {
    let topics = klout.topics(id).await?;
    debug!("{} topics for {}", topics.len(), id);
    writeln!(out, "Topics:")?;
    for topic in &topics {
        writeln!(out, "{}", topic.display_name)?;
    }
    Ok(())
}

pub struct KloutConnector {
    pub screen_name: String,
    root: PathBuf,
}

impl Default for KloutConnector {
    fn default() -> Self {
        Self::new(DEFAULT_SCREEN_NAME)
    }
}

impl KloutConnector {
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            root: PathBuf::new(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// The full call sequence against any Klout service.
    pub async fn report<S: KloutService + ?Sized>(
        &self,
        klout: &S,
        out: &mut dyn Write,
    ) -> Result<(), ConnectorError> {
        let id = resolve_user_id(klout, &self.screen_name, out).await?;
        show_user(klout, &id, out).await?;
        show_influence(klout, &id, out).await?;
        show_topics(klout, &id, out).await
    }
}

#[async_trait(?Send)]
impl Connector for KloutConnector {
    type Config = Properties;
    type Client = KloutClient;

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: "Klout",
            config_path: resolve(&self.root, paths::klout()),
        }
    }

    fn load_config(&self) -> Result<Properties, ConnectorError> {
        Ok(Properties::load(resolve(&self.root, paths::klout()))?)
    }

    async fn build_client(
        &self,
        properties: Properties,
        _prompt: &dyn AuthorizationPrompt,
    ) -> Result<KloutClient, ConnectorError> {
        let client = create_http_client(USER_AGENT)?;
        Ok(KloutClient::from_properties(client, &properties)?)
    }

    async fn invoke(&self, klout: KloutClient, out: &mut dyn Write) -> Result<(), ConnectorError> {
        self.report(&klout, out).await
    }
}
