//! Client for the hosted session store.
//!
//! The store persists comparison sessions per authenticated user and lists
//! them most-recent first. It is an external collaborator: this module only
//! speaks its REST contract and translates failures into readable errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::ServerConfig;
use crate::http::{
    RequestSimdJsonExt, ResponseSimdJsonExt, build_client, status_error_message,
};
use crate::types::{ChatSession, SessionListResponse, StoreResponse};

const DEFAULT_PAGE_SIZE: u32 = 100;
const STORE_TIMEOUT_SECONDS: u64 = 30;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// One page of the user's sessions, most recent first.
    async fn list_sessions(&self, page: u32, per_page: u32) -> Result<Vec<ChatSession>>;

    /// Create or replace a session by id.
    async fn upsert_session(&self, session: &ChatSession) -> Result<()>;

    async fn delete_session(&self, id: &str) -> Result<()>;
}

pub struct RestSessionStore {
    base_url: String,
    api_token: String,
    client: Client,
}

impl RestSessionStore {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client: build_client(STORE_TIMEOUT_SECONDS)?,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.api_token))
    }

    /// Walk pages until a short one. The store orders by recency, so the
    /// result is newest-first overall.
    pub async fn fetch_all_sessions(&self) -> Result<Vec<ChatSession>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_sessions(page, DEFAULT_PAGE_SIZE).await?;
            let batch_len = batch.len() as u32;
            all.extend(batch);
            if batch_len < DEFAULT_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    async fn check_envelope(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", status_error_message(status, &error_text));
        }

        let envelope: StoreResponse = response
            .simd_json()
            .await
            .context("Failed to parse store response")?;
        if !envelope.success {
            anyhow::bail!(
                "Store returned error: {}",
                envelope.error.unwrap_or_else(|| "Unknown error".to_string())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn list_sessions(&self, page: u32, per_page: u32) -> Result<Vec<ChatSession>> {
        let response = self
            .authorized(self.client.get(format!("{}/api/sessions", self.base_url)))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .context("Failed to reach session store")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", status_error_message(status, &error_text));
        }

        let listing: SessionListResponse = response
            .simd_json()
            .await
            .context("Failed to parse session list")?;
        Ok(listing.sessions)
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        let response = self
            .authorized(self.client.post(format!("{}/api/sessions", self.base_url)))
            .simd_json(session)?
            .send()
            .await
            .context("Failed to reach session store")?;

        Self::check_envelope(response).await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/api/sessions/{id}", self.base_url)),
            )
            .send()
            .await
            .context("Failed to reach session store")?;

        Self::check_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_session() -> ChatSession {
        ChatSession {
            id: "abc123".to_string(),
            message: "compare these".to_string(),
            responses: Vec::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            selected_models: vec!["gpt-4o".to_string()],
            best_response: None,
            response_time: Some(1.5),
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let config = ServerConfig {
            url: "https://store.example.com/".to_string(),
            api_token: "t".to_string(),
        };
        let store = RestSessionStore::new(&config).expect("client");
        assert_eq!(store.base_url, "https://store.example.com");
    }

    #[test]
    fn session_list_payload_round_trips() {
        let session = sample_session();
        let serialized = simd_json::to_string(&session).expect("serialize");
        let mut bytes = format!(r#"{{"sessions": [{serialized}]}}"#).into_bytes();

        let listing: SessionListResponse = simd_json::from_slice(&mut bytes).expect("parse");
        assert_eq!(listing.sessions.len(), 1);
        assert_eq!(listing.sessions[0].id, "abc123");
        assert_eq!(listing.sessions[0].selected_models, vec!["gpt-4o"]);
        assert_eq!(listing.sessions[0].response_time, Some(1.5));
    }

    #[test]
    fn missing_optional_fields_default() {
        let mut bytes = br#"{
            "id": "s1",
            "message": "hello",
            "timestamp": "2024-06-01T09:00:00Z"
        }"#
        .to_vec();

        let session: ChatSession = simd_json::from_slice(&mut bytes).expect("parse");
        assert!(session.responses.is_empty());
        assert!(session.selected_models.is_empty());
        assert_eq!(session.best_response, None);
        assert_eq!(session.response_time, None);
    }
}
