//! Console side of the authorization handshakes

use bookconnect_providers::AuthorizationPrompt;
use colored::*;
use dialoguer::Input;
use std::io::{self, BufRead, IsTerminal};
use tracing::{debug, warn};

fn into_io_error(e: dialoguer::Error) -> io::Error {
    match e {
        dialoguer::Error::IO(e) => e,
    }
}

/// Shows authorization URLs on stdout and reads pasted codes from stdin.
pub struct ConsolePrompt {
    open_browser: bool,
}

impl ConsolePrompt {
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl AuthorizationPrompt for ConsolePrompt {
    fn present_url(&self, url: &str) -> io::Result<()> {
        println!("Please open the following address in your browser:");
        println!("  {}", url.cyan());

        if self.open_browser {
            if let Err(e) = open::that(url) {
                warn!("Could not open a browser: {}", e);
            }
        }
        Ok(())
    }

    fn request_code(&self, url: &str) -> io::Result<String> {
        println!("Go to the authorization URL:");
        println!("  {}", url.cyan());

        let code = if io::stdin().is_terminal() {
            Input::<String>::new()
                .with_prompt("Paste the resulting code here")
                .interact_text()
                .map_err(into_io_error)?
        } else {
            println!("Paste the resulting code here:");
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        };

        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "No authorization code was entered",
            ));
        }
        debug!("Read authorization code ({} characters)", code.len());
        Ok(code)
    }
}
