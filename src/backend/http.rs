//! `reqwest`-based implementation of [`VoiceBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AudioClip, VoiceBackend};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult};

const CHAT_PATH: &str = "api/voice/chat";
const SYNTHESIZE_PATH: &str = "api/voice/synthesize";
const HEALTH_PATH: &str = "api/voice/health";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    page: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    page: &'a str,
}

/// Health report of the backend and its upstream services.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendHealth {
    /// Overall status, e.g. `healthy` or `degraded`.
    pub status: String,
    /// Per-service details, passed through untouched.
    #[serde(default)]
    pub services: serde_json::Value,
}

impl BackendHealth {
    /// Whether the backend reports itself fully healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// HTTP client for the voice backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    page: String,
    synthesis_timeout: Duration,
}

impl HttpBackend {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> BackendResult<Self> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.chat_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base,
            page: config.page.clone(),
            synthesis_timeout: config.synthesis_timeout,
        })
    }

    /// Query `GET /api/voice/health`.
    ///
    /// # Errors
    /// Returns an error if the backend is unreachable or answers with a failure.
    pub async fn health(&self) -> BackendResult<BackendHealth> {
        let url = self.endpoint(HEALTH_PATH)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        response
            .json::<BackendHealth>()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        Ok(self.base.join(path)?)
    }
}

#[async_trait]
impl VoiceBackend for HttpBackend {
    async fn chat(&self, message: &str) -> BackendResult<String> {
        let url = self.endpoint(CHAT_PATH)?;
        tracing::debug!(%url, chars = message.chars().count(), "Sending dialogue request");

        let response = self
            .client
            .post(url)
            .json(&ChatRequest {
                message,
                page: &self.page,
            })
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        Ok(body.response)
    }

    async fn synthesize(&self, text: &str) -> BackendResult<AudioClip> {
        let url = self.endpoint(SYNTHESIZE_PATH)?;
        tracing::debug!(%url, chars = text.chars().count(), "Sending synthesis request");

        let response = self
            .client
            .post(url)
            .timeout(self.synthesis_timeout)
            .json(&SynthesisRequest {
                text,
                page: &self.page,
            })
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(BackendError::from_reqwest)?;
        tracing::debug!(bytes = bytes.len(), "Synthesis response received");

        Ok(AudioClip::new(bytes, content_type))
    }
}
