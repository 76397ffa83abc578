//! CLI command implementations
//!
//! Every subcommand builds one connector from its arguments and hands it to
//! [`run_connector`].

use anyhow::{Context, Result};
use bookconnect_connectors::{run, Connector};
use std::io;

use crate::prompt::ConsolePrompt;

/// Runs a connector against the console, printing its results on stdout.
pub async fn run_connector<C: Connector>(connector: C, open_browser: bool) -> Result<()> {
    let metadata = connector.metadata();
    let prompt = ConsolePrompt::new(open_browser);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    run(&connector, &prompt, &mut out)
        .await
        .with_context(|| format!("{} connector failed", metadata.name))
}
