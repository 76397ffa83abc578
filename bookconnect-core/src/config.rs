//! Connector configuration files
//!
//! Every connector reads its credentials from a small file at a fixed
//! relative path: a properties file (`key=value` lines) for Twitter, LinkedIn,
//! Klout and the quotes database, and a JSON client secret document for Google.
//! Missing keys are never defaulted; they surface as [`ConfigError::MissingKey`]
//! the first time a connector asks for them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::secure_logging::is_sensitive_field;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Malformed configuration file {}: {}", .path.display(), .reason)]
    Malformed { path: PathBuf, reason: String },
    #[error("Missing key '{}' in {}", .key, .path.display())]
    MissingKey { path: PathBuf, key: String },
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fixed relative locations of the connector configuration files.
pub mod paths {
    use std::path::PathBuf;

    /// Directory holding the Google client secret and the token store
    pub const GOOGLE_DIR: &str = "google";

    pub fn twitter(account: &str) -> PathBuf {
        PathBuf::from(format!("twitter/{}.properties", account))
    }

    pub fn linkedin(application: &str) -> PathBuf {
        PathBuf::from(format!("linkedin/{}.properties", application))
    }

    pub fn klout() -> PathBuf {
        PathBuf::from("klout/klout.properties")
    }

    pub fn google_client_secret() -> PathBuf {
        PathBuf::from(GOOGLE_DIR).join("client_secret.json")
    }

    pub fn google_token_store() -> PathBuf {
        PathBuf::from(GOOGLE_DIR)
    }

    pub fn database() -> PathBuf {
        PathBuf::from("database/database.properties")
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Key/value pairs loaded from a properties file.
#[derive(Clone)]
pub struct Properties {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: BTreeMap<&str, &str> = self
            .entries
            .iter()
            .map(|(key, value)| {
                let shown = if is_sensitive_field(key) { "***REDACTED***" } else { value.as_str() };
                (key.as_str(), shown)
            })
            .collect();
        f.debug_struct("Properties")
            .field("path", &self.path)
            .field("entries", &entries)
            .finish()
    }
}

impl Properties {
    /// Loads and parses a properties file.
    ///
    /// Files are expected in UTF-8; anything else is decoded as ISO-8859-1,
    /// the historical encoding of properties files.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let content = String::from_utf8(bytes)
            .unwrap_or_else(|e| e.into_bytes().iter().map(|&b| b as char).collect());

        let properties = Self::parse(&content, path)?;
        debug!(
            "Loaded {} properties from {}",
            properties.len(),
            path.display()
        );
        Ok(properties)
    }

    /// Parses properties text. `path` is only used for error reporting.
    pub fn parse(content: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut entries = HashMap::new();
        let mut lines = content.lines().enumerate();

        while let Some((index, raw)) = lines.next() {
            let line_number = index + 1;
            let trimmed = raw.trim_start_matches(is_blank);
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut logical = trimmed.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let malformed = |reason: String| ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: format!("line {}: {}", line_number, reason),
            };
            let key = unescape(key).map_err(malformed)?;
            let value = unescape(value).map_err(malformed)?;
            entries.insert(key, value);
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, failing when the file does not define it.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            path: self.path.clone(),
            key: key.to_string(),
        })
    }

    /// `true` only when the key is present and exactly `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\x0c'
}

fn is_separator(c: char) -> bool {
    c == '=' || c == ':'
}

/// An odd number of trailing backslashes continues the logical line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if is_separator(c) || is_blank(c) {
            key_end = i;
            break;
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(is_separator) {
        rest = stripped.trim_start_matches(is_blank);
    }
    (key, rest)
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.chars().count() != 4 {
                    return Err(format!("truncated unicode escape \\u{}", hex));
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid unicode escape \\u{}", hex))?;
                let decoded = char::from_u32(code)
                    .ok_or_else(|| format!("unicode escape \\u{} is not a character", hex))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            // Continuation at end of input
            None => {}
        }
    }

    Ok(out)
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client identity from a Google `client_secret.json` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsDocument {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let content = String::from_utf8(bytes).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {}", e),
        })?;
        Self::parse(&content, path)
    }

    /// Accepts both the "installed" and the "web" application layouts.
    pub fn parse(content: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document: ClientSecretsDocument =
            serde_json::from_str(content).map_err(|e| ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: format!("line {}: {}", e.line(), e),
            })?;

        document
            .installed
            .or(document.web)
            .ok_or_else(|| ConfigError::Malformed {
                path: path.to_path_buf(),
                reason: "expected an \"installed\" or \"web\" section".to_string(),
            })
    }
}
