//! Outbound calls to inference backends.

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::backend::{extract_generated_text, BackendDescriptor};
use crate::error::BackendError;

/// Sends a prompt to one backend and returns its generated text.
///
/// Implementations report every failure as a [`BackendError`]; deciding what
/// to do about it is the dispatcher's job.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Complete `prompt` using `backend`.
    async fn complete(&self, backend: &BackendDescriptor, prompt: &str) -> Result<String, BackendError>;
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport reusing an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn complete(&self, backend: &BackendDescriptor, prompt: &str) -> Result<String, BackendError> {
        let body = backend.family.request_body(prompt);
        trace!(backend = %backend.id, endpoint = %backend.endpoint, "Sending completion request");

        let response = self
            .client
            .post(&backend.endpoint)
            .bearer_auth(&backend.api_key)
            .header("Content-Type", "application/json")
            .timeout(backend.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let json: Value = response.json().await?;
        extract_generated_text(&json)
    }
}
