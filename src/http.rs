//! Shared HTTP plumbing for the session store and completion provider
//! clients: a preconfigured reqwest client, simd-json body handling, and
//! status-code-to-message mapping.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;

pub fn build_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .context("Failed to create HTTP client")
}

/// Extension trait to send request bodies as JSON via simd-json.
pub trait RequestSimdJsonExt {
    fn simd_json<T>(self, json: &T) -> Result<RequestBuilder>
    where
        T: Serialize + ?Sized;
}

impl RequestSimdJsonExt for RequestBuilder {
    fn simd_json<T>(self, json: &T) -> Result<RequestBuilder>
    where
        T: Serialize + ?Sized,
    {
        let body = simd_json::to_vec(json).context("Failed to serialize request body")?;
        Ok(self
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body))
    }
}

/// Extension trait to parse response bodies as JSON via simd-json.
pub trait ResponseSimdJsonExt {
    async fn simd_json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned;
}

impl ResponseSimdJsonExt for Response {
    async fn simd_json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        let mut bytes = bytes.to_vec();
        let result = simd_json::from_slice(&mut bytes)?;
        Ok(result)
    }
}

/// Pull the `error` field out of a JSON error body, if there is one. The
/// hosted services answer errors as `{"error": "message"}`.
pub fn parse_json_error(error_body: &str) -> Option<String> {
    if !error_body.trim_start().starts_with('{') {
        return None;
    }
    let mut bytes = error_body.as_bytes().to_vec();
    simd_json::from_slice::<ErrorBody>(&mut bytes)
        .ok()
        .map(|body| body.error)
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

/// Translate an HTTP error status plus body into a message worth showing.
/// Provider error payloads are passed through where they parse.
pub fn status_error_message(status: reqwest::StatusCode, error_text: &str) -> String {
    let parsed_error = parse_json_error(error_text);

    match status.as_u16() {
        400 => match parsed_error {
            Some(msg) => format!("Bad request: {msg}"),
            None if !error_text.is_empty() => format!("Bad request: {error_text}"),
            None => "Bad request".to_string(),
        },
        401 => "Unauthorized: check your API token".to_string(),
        403 => "Invalid API token".to_string(),
        404 => "Server not found".to_string(),
        409 => "Conflict".to_string(),
        422 => match parsed_error {
            Some(msg) => format!("Validation: {msg}"),
            None if !error_text.is_empty() => format!("Validation: {error_text}"),
            None => "Validation error".to_string(),
        },
        429 => "Rate limited".to_string(),
        500..=599 => match parsed_error {
            Some(msg) => format!("Server error: {msg}"),
            None if !error_text.is_empty() => format!("Server error: {error_text}"),
            None => format!("Server error ({})", status.as_u16()),
        },
        _ => match parsed_error {
            Some(msg) => msg,
            None if !error_text.is_empty() => error_text.to_string(),
            None => format!("Error {}", status.as_u16()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn parses_error_field_from_json_body() {
        assert_eq!(
            parse_json_error(r#"{"error": "token expired"}"#),
            Some("token expired".to_string())
        );
        assert_eq!(parse_json_error(r#"{"detail": "nope"}"#), None);
        assert_eq!(parse_json_error("plain text"), None);
        assert_eq!(parse_json_error("{not json"), None);
    }

    #[test]
    fn maps_auth_statuses() {
        assert_eq!(
            status_error_message(StatusCode::UNAUTHORIZED, ""),
            "Unauthorized: check your API token"
        );
        assert_eq!(
            status_error_message(StatusCode::FORBIDDEN, ""),
            "Invalid API token"
        );
        assert_eq!(
            status_error_message(StatusCode::TOO_MANY_REQUESTS, ""),
            "Rate limited"
        );
    }

    #[test]
    fn passes_provider_errors_through() {
        assert_eq!(
            status_error_message(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error": "database unavailable"}"#
            ),
            "Server error: database unavailable"
        );
        assert_eq!(
            status_error_message(StatusCode::BAD_GATEWAY, "upstream reset"),
            "Server error: upstream reset"
        );
        assert_eq!(
            status_error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "Server error (500)"
        );
    }

    #[test]
    fn maps_validation_statuses() {
        assert_eq!(
            status_error_message(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"error": "message must not be empty"}"#
            ),
            "Validation: message must not be empty"
        );
        assert_eq!(
            status_error_message(StatusCode::BAD_REQUEST, "missing field"),
            "Bad request: missing field"
        );
    }
}
