//! External collaborators the pipeline composes but does not own.
//!
//! Fine-tuning, vector indexing/retrieval, and speech synthesis are all
//! delegated: the pipeline only knows their public contracts, expressed here
//! as traits so steps stay testable without the real processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use tokio::process::Command;
use worker_rpc::{GenerateRequest, WorkerClient};

use crate::error::{PipelineError, Result};

/// One fine-tune invocation. Arguments are passed positionally, in this
/// order, to the training collaborator.
#[derive(Debug, Clone)]
pub struct FineTuneSpec {
    pub base_model: String,
    pub train_file: String,
    pub output_dir: PathBuf,
    pub num_epochs: u32,
    pub learning_rate: f64,
    pub lora_r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f64,
}

#[async_trait]
pub trait FineTuneRunner: Send + Sync {
    /// Run training to completion. Success is exit code 0 with adapter
    /// artifacts written to `spec.output_dir`.
    async fn run(&self, spec: &FineTuneSpec) -> Result<()>;
}

/// Launches the training collaborator as a subprocess and waits for it.
pub struct SubprocessFineTune {
    program: String,
    leading_args: Vec<String>,
}

impl SubprocessFineTune {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }
}

#[async_trait]
impl FineTuneRunner for SubprocessFineTune {
    async fn run(&self, spec: &FineTuneSpec) -> Result<()> {
        tracing::info!(
            base_model = %spec.base_model,
            output_dir = %spec.output_dir.display(),
            "Starting fine-tune"
        );

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(&spec.base_model)
            .arg(&spec.train_file)
            .arg(&spec.output_dir)
            .arg(spec.num_epochs.to_string())
            .arg(spec.learning_rate.to_string())
            .arg(spec.lora_r.to_string())
            .arg(spec.lora_alpha.to_string())
            .arg(spec.lora_dropout.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(PipelineError::FineTune {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        tracing::info!(output_dir = %spec.output_dir.display(), "Fine-tune completed");
        Ok(())
    }
}

#[async_trait]
pub trait RagService: Send + Sync {
    /// Build (or rebuild) the named index from the given document paths.
    async fn build_index(&self, index_name: &str, docs: &[String]) -> Result<()>;

    /// Retrieval-augmented answer against the named index.
    async fn answer(&self, index_name: &str, query: &str) -> Result<String>;
}

/// RAG collaborator reached over HTTP, using the external service's
/// `/rag/index` and `/rag/query` contract.
pub struct HttpRagService {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RagAnswer {
    #[serde(default)]
    answer: String,
}

impl HttpRagService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, route: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{route}", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(60))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Rag(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Rag(format!("status {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl RagService for HttpRagService {
    async fn build_index(&self, index_name: &str, docs: &[String]) -> Result<()> {
        self.post(
            "/rag/index",
            serde_json::json!({ "index_name": index_name, "paths": docs }),
        )
        .await?;
        Ok(())
    }

    async fn answer(&self, index_name: &str, query: &str) -> Result<String> {
        let response = self
            .post(
                "/rag/query",
                serde_json::json!({ "index_name": index_name, "question": query }),
            )
            .await?;
        let answer: RagAnswer = response
            .json()
            .await
            .map_err(|e| PipelineError::Rag(e.to_string()))?;
        Ok(answer.answer)
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize narration for `text` into a wav file at `path`.
    async fn synthesize_to(&self, text: &str, path: &Path) -> Result<()>;
}

/// Speech collaborator backed by the speech worker's RPC endpoint. The heavy
/// lifting happens out of process, so a run's task never blocks on it.
pub struct WorkerSpeech {
    client: WorkerClient,
}

const SPEECH_TIMEOUT: Duration = Duration::from_secs(180);

impl WorkerSpeech {
    pub fn new(client: WorkerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechSynthesizer for WorkerSpeech {
    async fn synthesize_to(&self, text: &str, path: &Path) -> Result<()> {
        let request = GenerateRequest::new(text);
        let response = self
            .client
            .generate_with_timeout(&request, SPEECH_TIMEOUT)
            .await?;
        let audio = response.audio()?;

        // Workers may answer with a bare base64 payload or a full data URL.
        let encoded = audio.rsplit(',').next().unwrap_or(audio);
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| PipelineError::Payload(format!("audio is not valid base64: {e}")))?;

        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}
