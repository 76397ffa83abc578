//! Shared HTTP plumbing for the vendor clients
//!
//! One `reqwest::Client` per connector run, constructed here with the same
//! timeouts for every vendor, plus the response handling they all share:
//! non-2xx statuses become [`HttpError::Api`] with the vendor's own error
//! message when one can be found in the body.

use bookconnect_core::redact_sensitive_data;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_LOGGED_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Create a reqwest HTTP client with the standard configuration
pub fn create_http_client(user_agent: &str) -> Result<Client, HttpError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()?)
}

/// Pulls a human readable message out of a vendor error body.
///
/// Known layouts:
/// - Google APIs: `{"error": {"code": 400, "message": "..."}}`
/// - OAuth token endpoints: `{"error": "invalid_grant", "error_description": "..."}`
/// - Twitter: `{"errors": [{"code": 32, "message": "..."}]}`
/// - LinkedIn and Klout: `{"message": "..."}` or `{"description": "..."}`
pub fn extract_error_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(error_obj) = parsed.get("error") {
            if let Some(message) = error_obj.get("message").and_then(|v| v.as_str()) {
                return message.to_string();
            }
            if let Some(code) = error_obj.as_str() {
                return match parsed.get("error_description").and_then(|v| v.as_str()) {
                    Some(description) => format!("{}: {}", code, description),
                    None => code.to_string(),
                };
            }
        }

        if let Some(message) = parsed
            .get("errors")
            .and_then(|v| v.as_array())
            .and_then(|errors| errors.first())
            .and_then(|first| first.get("message"))
            .and_then(|v| v.as_str())
        {
            return message.to_string();
        }

        for field in ["message", "description"] {
            if let Some(message) = parsed.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {} error", status)
    } else {
        truncate(trimmed, MAX_LOGGED_BODY)
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

/// Reads the body, failing on a non-success status.
pub(crate) async fn read_text(response: Response) -> Result<String, HttpError> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await?;
    debug!("{} {} ({} bytes)", status, redact_sensitive_data(url.as_str()), body.len());

    if !status.is_success() {
        let message = extract_error_message(&body, status);
        error!("API error {} from {}: {}", status, url.host_str().unwrap_or_default(), message);
        return Err(HttpError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(body)
}

/// Reads and deserializes a JSON body, failing on a non-success status.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let body = read_text(response).await?;
    serde_json::from_str(&body).map_err(|e| {
        HttpError::Decode(format!(
            "{} (body: {})",
            e,
            truncate(&redact_sensitive_data(&body), MAX_LOGGED_BODY)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_google_error() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::NOT_FOUND),
            "Requested entity was not found."
        );
    }

    #[test]
    fn test_extract_oauth_error() {
        let body = r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::BAD_REQUEST),
            "invalid_grant: Bad Request"
        );
    }

    #[test]
    fn test_extract_twitter_error() {
        let body = r#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::UNAUTHORIZED),
            "Could not authenticate you."
        );
    }

    #[test]
    fn test_extract_linkedin_error() {
        let body = r#"{"serviceErrorCode":65600,"message":"Invalid access token","status":401}"#;
        assert_eq!(
            extract_error_message(body, StatusCode::UNAUTHORIZED),
            "Invalid access token"
        );
    }

    #[test]
    fn test_extract_plain_body() {
        assert_eq!(
            extract_error_message("<error>nope</error>", StatusCode::FORBIDDEN),
            "<error>nope</error>"
        );
        assert_eq!(
            extract_error_message("", StatusCode::BAD_GATEWAY),
            "HTTP 502 Bad Gateway error"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
