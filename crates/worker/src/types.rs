use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request payload accepted by every worker's generate endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Seed image (data URL or http(s) URL) for vision and img2img workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_sampling(mut self, temperature: f64, top_p: f64, max_new_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.top_p = Some(top_p);
        self.max_new_tokens = Some(max_new_tokens);
        self
    }

    pub fn with_adapter(mut self, adapter_name: impl Into<String>) -> Self {
        self.adapter_name = Some(adapter_name.into());
        self
    }
}

/// Response from a worker generate call. Which field is populated depends
/// on the modality; the accessors convert an unexpectedly empty response
/// into a typed error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub usage: Option<Value>,
}

impl GenerateResponse {
    pub fn text(&self) -> crate::Result<&str> {
        self.text
            .as_deref()
            .ok_or(crate::WorkerError::MissingField("text"))
    }

    pub fn image_url(&self) -> crate::Result<&str> {
        self.image_url
            .as_deref()
            .ok_or(crate::WorkerError::MissingField("image_url"))
    }

    pub fn audio(&self) -> crate::Result<&str> {
        self.audio
            .as_deref()
            .ok_or(crate::WorkerError::MissingField("audio"))
    }
}
