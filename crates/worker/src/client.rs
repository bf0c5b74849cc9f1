use std::time::Duration;

use reqwest::Client;

use crate::error::{Result, WorkerError};
use crate::types::{GenerateRequest, GenerateResponse};

/// Default per-call timeout for text and retrieval calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Vision calls carry an image payload and run a larger model.
pub const VISION_TIMEOUT: Duration = Duration::from_secs(120);
/// Story generation is the longest single call in a run.
pub const STORY_TIMEOUT: Duration = Duration::from_secs(180);
/// Diffusion sampling takes a while on local hardware.
pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Uniform RPC client for one worker's generate endpoint.
pub struct WorkerClient {
    base_url: String,
    client: Client,
}

impl WorkerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// Point a client at a worker on a localhost port.
    pub fn for_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call the generate endpoint with the default text timeout.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.generate_with_timeout(request, DEFAULT_TIMEOUT).await
    }

    /// Call the generate endpoint with a caller-chosen timeout.
    pub async fn generate_with_timeout(
        &self,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<GenerateResponse> {
        let url = format!("{}/worker_generate", self.base_url);
        tracing::debug!(url = %url, prompt_length = request.prompt.len(), "Calling worker");

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
