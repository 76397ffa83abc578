//! bookconnect CLI Application
//!
//! One subcommand per connector. Each reads its configuration from the
//! current directory, authenticates, makes its calls and prints the results.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::{debug, info};

use bookconnect_connectors::connectors::{google, klout, linkedin, twitter};
use bookconnect_connectors::{
    GoogleConnector, KloutConnector, LinkedInConnector, QuotesConnector, TwitterConnector,
};
use bookconnect_core::init_logging;

mod commands;
mod prompt;

use commands::run_connector;

#[derive(Parser)]
#[command(name = "bookconnect")]
#[command(about = "Credentialed API connectors: Google Sheets, LinkedIn, Twitter, Klout and a quotes database")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Print authorization URLs without trying to open a browser
    #[arg(long, global = true)]
    pub no_browser: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read one cell of a Google spreadsheet and write another
    Google {
        /// Application name sent as the user agent
        #[arg(long, default_value = google::DEFAULT_APPLICATION_NAME)]
        application_name: String,

        /// Spreadsheet to read from and write to
        #[arg(long, default_value = google::DEFAULT_SPREADSHEET_ID)]
        spreadsheet_id: String,

        /// Range whose first cell is printed
        #[arg(long, default_value = google::DEFAULT_RANGE)]
        range: String,

        /// Value written to the target cell
        #[arg(long, default_value = google::DEFAULT_VALUE)]
        value: String,

        /// Zero-based row of the target cell
        #[arg(long, default_value_t = 0)]
        row: i32,

        /// Zero-based column of the target cell
        #[arg(long, default_value_t = 1)]
        column: i32,
    },

    /// Print the LinkedIn profile of the authorizing member
    Linkedin {
        /// Application whose properties file is used
        #[arg(short, long, default_value = linkedin::DEFAULT_APPLICATION)]
        application: String,
    },

    /// Print the authenticated Twitter user
    Twitter {
        /// Account whose properties file is used
        #[arg(short, long, default_value = twitter::DEFAULT_ACCOUNT)]
        account: String,
    },

    /// Print the Klout identity, influence and topics of a Twitter user
    Klout {
        /// Twitter screen name to look up
        #[arg(short, long, default_value = klout::DEFAULT_SCREEN_NAME)]
        screen_name: String,
    },

    /// Print every quote stored in the database
    Quotes,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::INFO
    };
    init_logging(log_level).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    debug!("Starting bookconnect with command: {:?}", cli.command);

    match run_command(cli).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let open_browser = !cli.no_browser;
    match cli.command {
        Commands::Google {
            application_name,
            spreadsheet_id,
            range,
            value,
            row,
            column,
        } => {
            let mut connector = GoogleConnector::default();
            connector.application_name = application_name;
            connector.spreadsheet_id = spreadsheet_id;
            connector.range = range;
            connector.value = value;
            connector.row = row;
            connector.column = column;
            run_connector(connector, open_browser).await
        }
        Commands::Linkedin { application } => {
            run_connector(LinkedInConnector::new(application), open_browser).await
        }
        Commands::Twitter { account } => {
            run_connector(TwitterConnector::new(account), open_browser).await
        }
        Commands::Klout { screen_name } => {
            run_connector(KloutConnector::new(screen_name), open_browser).await
        }
        Commands::Quotes => run_connector(QuotesConnector::new(), open_browser).await,
    }
}
