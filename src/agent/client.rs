// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP client for an opencode-compatible agent server

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::sse;
use super::types::{
    AgentInfo, HealthInfo, MessageWithParts, PromptRequest, PromptResponse, ProviderInfo,
    ProvidersResponse, SessionInfo,
};
use super::{AgentService, EventStream};
use crate::error::{ApiError, BridgeError, Result};

/// Longest error body echoed back in error messages
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Agent service client speaking the opencode server API
#[derive(Clone)]
pub struct OpencodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpencodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BridgeError::Api(ApiError::Network(format!("{what}: {e}"))))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = sanitize_error_body(&response.text().await.unwrap_or_default());
        if status == StatusCode::NOT_FOUND {
            return Err(BridgeError::Api(ApiError::NotFound(format!("{what}: {body}"))));
        }
        Err(BridgeError::Api(ApiError::ServerError {
            status: status.as_u16(),
            message: format!("{what} failed: {body}"),
        }))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.send(request, what).await?;
        let body = response.text().await.map_err(|e| {
            BridgeError::Api(ApiError::InvalidResponse(format!(
                "{what} response body read failed: {e}"
            )))
        })?;
        serde_json::from_str(&body).map_err(|e| {
            BridgeError::Api(ApiError::InvalidResponse(format!(
                "{what} response parse failed: {e}; body: {}",
                sanitize_error_body(&body)
            )))
        })
    }
}

#[async_trait]
impl AgentService for OpencodeClient {
    async fn create_session(&self, title: &str, directory: Option<&str>) -> Result<SessionInfo> {
        let mut request = self
            .client
            .post(self.url("/session"))
            .json(&serde_json::json!({ "title": title }));
        if let Some(directory) = directory {
            request = request.query(&[("directory", directory)]);
        }
        self.send_json(request, "session create").await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        self.send_json(self.client.get(self.url("/session")), "session list")
            .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let request = self.client.get(self.url(&format!("/session/{session_id}")));
        match self.send_json(request, "session get").await {
            Ok(session) => Ok(Some(session)),
            Err(BridgeError::Api(ApiError::NotFound(_))) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/session/{session_id}")));
        self.send(request, "session delete").await?;
        Ok(())
    }

    async fn prompt(&self, session_id: &str, request: PromptRequest) -> Result<PromptResponse> {
        let request = self
            .client
            .post(self.url(&format!("/session/{session_id}/message")))
            .json(&request);
        let response = self.send(request, "prompt").await?;
        // noReply prompts may answer with an empty body
        let body = response.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(PromptResponse { info: None });
        }
        serde_json::from_str(&body).map_err(|e| {
            BridgeError::Api(ApiError::InvalidResponse(format!(
                "prompt response parse failed: {e}"
            )))
        })
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<MessageWithParts>> {
        let request = self
            .client
            .get(self.url(&format!("/session/{session_id}/message")));
        self.send_json(request, "message list").await
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        let response: ProvidersResponse = self
            .send_json(self.client.get(self.url("/config/providers")), "provider list")
            .await?;
        Ok(response.providers)
    }

    async fn agents(&self) -> Result<Vec<AgentInfo>> {
        self.send_json(self.client.get(self.url("/agent")), "agent list")
            .await
    }

    async fn health(&self) -> Result<HealthInfo> {
        self.send_json(self.client.get(self.url("/global/health")), "health check")
            .await
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let request = self
            .client
            .get(self.url("/event"))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = self.send(request, "event subscribe").await?;
        tracing::debug!(base_url = %self.base_url, "event feed connected");
        Ok(sse::from_response(response))
    }
}

/// Collapse whitespace and cap length so error bodies stay log-friendly.
fn sanitize_error_body(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        collapsed
    }
}
