//! File-backed OAuth token store
//!
//! Tokens obtained by an installed-app OAuth flow are kept as one JSON file
//! per user id (`<dir>/<user id>.json`) so that later runs can skip the
//! browser step.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Token store I/O error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt token file {}: {}", .path.display(), .source)]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
}

const MAX_USER_ID_LENGTH: usize = 128;

/// Seconds before the recorded expiry at which a token is treated as expired
const EXPIRY_SKEW_SECONDS: i64 = 60;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// A persisted OAuth 2.0 credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredCredential {
    /// Tokens without a recorded expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => at <= now + Duration::seconds(EXPIRY_SKEW_SECONDS),
            None => false,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// One JSON file per user id inside a directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn validate_user_id(user_id: &str) -> Result<(), StoreError> {
        if user_id.is_empty() || user_id.len() > MAX_USER_ID_LENGTH {
            return Err(StoreError::InvalidUserId(format!(
                "User id must be 1-{} characters",
                MAX_USER_ID_LENGTH
            )));
        }

        if !user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            || user_id.starts_with('.')
        {
            return Err(StoreError::InvalidUserId(format!(
                "User id contains invalid characters: {}",
                user_id
            )));
        }

        Ok(())
    }

    pub fn path_for(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        Self::validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{}.json", user_id)))
    }

    /// Returns `None` when nothing has been stored for the user yet.
    pub fn load(&self, user_id: &str) -> Result<Option<StoredCredential>, StoreError> {
        let path = self.path_for(user_id)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No stored credential at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let credential =
            serde_json::from_str(&data).map_err(|source| StoreError::Serde { path, source })?;
        Ok(Some(credential))
    }

    pub fn store(&self, user_id: &str, credential: &StoredCredential) -> Result<(), StoreError> {
        let path = self.path_for(user_id)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let data = serde_json::to_string_pretty(credential).map_err(|source| StoreError::Serde {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).map_err(|source| {
                StoreError::Io {
                    path: path.clone(),
                    source,
                }
            })?;
        }

        info!("Stored credential for {} in {}", user_id, path.display());
        Ok(())
    }
}
