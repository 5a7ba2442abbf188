//! Client for the multi-model completion provider.
//!
//! One prompt fans out to every selected model concurrently; each model's
//! answer (or failure) becomes a [`ModelResponse`], and the round as a whole
//! becomes a [`ChatSession`]. A round never fails wholesale: a session where
//! every model errored is still a session.

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::http::{
    RequestSimdJsonExt, ResponseSimdJsonExt, build_client, status_error_message,
};
use crate::types::{ChatSession, ModelResponse};
use crate::utils::hash_text;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

pub struct CompletionClient {
    base_url: String,
    api_token: String,
    client: Client,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client: build_client(config.timeout_seconds)?,
        })
    }

    /// Ask a single model for a completion, returning the raw text.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/api/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .simd_json(&request)?
            .send()
            .await
            .context("Failed to reach completion provider")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", status_error_message(status, &error_text));
        }

        let completion: CompletionResponse = response
            .simd_json()
            .await
            .context("Failed to parse completion response")?;
        Ok(completion.text)
    }

    /// Run one comparison round: query every model concurrently, time each,
    /// and assemble the results into a session.
    pub async fn run_comparison(&self, prompt: &str, models: &[String]) -> ChatSession {
        let started = Instant::now();
        let timestamp = Utc::now();

        let queries = models.iter().map(|model| async move {
            let model_started = Instant::now();
            let outcome = self.complete(model, prompt).await;
            let elapsed = model_started.elapsed().as_secs_f64();
            match outcome {
                Ok(content) => ModelResponse {
                    model: model.clone(),
                    content,
                    success: true,
                    error: None,
                    response_time: Some(round_seconds(elapsed)),
                },
                Err(e) => ModelResponse {
                    model: model.clone(),
                    content: String::new(),
                    success: false,
                    error: Some(format!("{e:#}")),
                    response_time: Some(round_seconds(elapsed)),
                },
            }
        });

        let responses = join_all(queries).await;
        let total = round_seconds(started.elapsed().as_secs_f64());

        build_session(prompt, models, responses, timestamp, total)
    }
}

/// Session ids are content-derived: a hash of the prompt and start time,
/// truncated to 16 hex chars, so retries of the same round collide into the
/// same store record.
pub fn session_id(prompt: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}:{}", prompt, timestamp.to_rfc3339());
    hash_text(&input)[..16].to_string()
}

fn build_session(
    prompt: &str,
    models: &[String],
    responses: Vec<ModelResponse>,
    timestamp: DateTime<Utc>,
    total_seconds: f64,
) -> ChatSession {
    ChatSession {
        id: session_id(prompt, timestamp),
        message: prompt.to_string(),
        responses,
        timestamp,
        selected_models: models.to_vec(),
        best_response: None,
        response_time: Some(total_seconds),
    }
}

fn round_seconds(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn session_id_is_stable_and_short() {
        let a = session_id("hello", t0());
        let b = session_id("hello", t0());
        let c = session_id("hello", t0() + chrono::Duration::seconds(1));
        let d = session_id("other", t0());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn build_session_captures_failures_without_failing() {
        let models = vec!["gpt-4o".to_string(), "grok-2".to_string()];
        let responses = vec![
            ModelResponse {
                model: "gpt-4o".to_string(),
                content: "fine answer".to_string(),
                success: true,
                error: None,
                response_time: Some(0.8),
            },
            ModelResponse {
                model: "grok-2".to_string(),
                content: String::new(),
                success: false,
                error: Some("Rate limited".to_string()),
                response_time: Some(0.2),
            },
        ];

        let session = build_session("compare", &models, responses, t0(), 1.0);

        assert_eq!(session.message, "compare");
        assert_eq!(session.selected_models, models);
        assert_eq!(session.responses.len(), 2);
        assert!(session.responses[0].success);
        assert!(!session.responses[1].success);
        assert_eq!(
            session.responses[1].error.as_deref(),
            Some("Rate limited")
        );
        assert_eq!(session.response_time, Some(1.0));
        assert_eq!(session.best_response, None);
    }

    #[test]
    fn completion_request_serializes_to_provider_shape() {
        let request = CompletionRequest {
            model: "gpt-4o",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
        };

        let serialized = simd_json::to_string(&request).expect("serialize");
        assert!(serialized.contains(r#""model":"gpt-4o""#));
        assert!(serialized.contains(r#""role":"user""#));
        assert!(serialized.contains(r#""content":"hi""#));
    }

    #[test]
    fn round_seconds_keeps_millisecond_precision() {
        assert_eq!(round_seconds(1.23456), 1.235);
        assert_eq!(round_seconds(0.0001), 0.0);
    }
}
