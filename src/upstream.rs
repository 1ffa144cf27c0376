use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Per-call sampling settings. `timeout` adds an explicit race on top of the
/// client-wide timeout.
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request to upstream failed: {0}")]
    Transport(String),

    #[error("no response from upstream within {0:?}")]
    Timeout(Duration),

    #[error("upstream returned invalid JSON: {0}")]
    InvalidJson(String),
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

// One POST per call, no retries.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    config: Arc<Config>,
    url: String,
}

impl UpstreamClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("failed to build HTTP client")?;
        let url = format!("{}{}", config.base_url, COMPLETIONS_PATH);
        Ok(Self { http, config, url })
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        params: CompletionParams,
    ) -> Result<Value, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured)?;

        debug!(
            model = %self.config.model,
            messages = messages.len(),
            max_tokens = params.max_tokens,
            "calling upstream"
        );

        let call = self.send(api_key, messages, params);
        match params.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| UpstreamError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn send(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
    ) -> Result<Value, UpstreamError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let res = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            warn!(status = status.as_u16(), %body, "upstream returned an error");
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let text = res.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidJson(e.to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.upstream_timeout)
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}
