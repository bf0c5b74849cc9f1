//! Shared fakes and context builders for step tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::MockServer;
use worker_rpc::WorkerClient;

use crate::collaborators::{FineTuneRunner, FineTuneSpec, RagService, SpeechSynthesizer};
use crate::engine::StepContext;
use crate::error::{PipelineError, Result};
use crate::PromptBudgeter;

/// One mock server per worker modality.
pub struct TestWorkers {
    pub text: MockServer,
    pub vision: MockServer,
    pub image: MockServer,
}

impl TestWorkers {
    pub async fn start() -> Self {
        Self {
            text: MockServer::start().await,
            vision: MockServer::start().await,
            image: MockServer::start().await,
        }
    }
}

#[derive(Default)]
pub struct NullFineTune;

#[async_trait]
impl FineTuneRunner for NullFineTune {
    async fn run(&self, _spec: &FineTuneSpec) -> Result<()> {
        Ok(())
    }
}

/// Records invocations and the last spec; optionally fails every run.
pub struct CountingFineTune {
    fail: bool,
    invocations: AtomicUsize,
    last_spec: Mutex<Option<FineTuneSpec>>,
}

impl Default for CountingFineTune {
    fn default() -> Self {
        Self {
            fail: false,
            invocations: AtomicUsize::new(0),
            last_spec: Mutex::new(None),
        }
    }
}

impl CountingFineTune {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<FineTuneSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

#[async_trait]
impl FineTuneRunner for CountingFineTune {
    async fn run(&self, spec: &FineTuneSpec) -> Result<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        if self.fail {
            return Err(PipelineError::FineTune {
                code: 1,
                stderr: "synthetic failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Answers every query with a fixed string and counts index builds.
#[derive(Default)]
pub struct StaticRag {
    answer: String,
    builds: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl StaticRag {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Default::default()
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl RagService for StaticRag {
    async fn build_index(&self, _index_name: &str, _docs: &[String]) -> Result<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn answer(&self, _index_name: &str, query: &str) -> Result<String> {
        *self.last_query.lock().unwrap() = Some(query.to_string());
        Ok(self.answer.clone())
    }
}

pub struct FailingRag;

#[async_trait]
impl RagService for FailingRag {
    async fn build_index(&self, _index_name: &str, _docs: &[String]) -> Result<()> {
        Err(PipelineError::Rag("index build exploded".to_string()))
    }

    async fn answer(&self, _index_name: &str, _query: &str) -> Result<String> {
        Err(PipelineError::Rag("retrieval exploded".to_string()))
    }
}

/// Writes a fixed wav payload to the requested path; optionally fails after
/// writing, to exercise scratch cleanup on the error path.
pub struct FakeSpeech {
    fail: bool,
    last_path: Mutex<Option<PathBuf>>,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self {
            fail: false,
            last_path: Mutex::new(None),
        }
    }
}

impl FakeSpeech {
    pub const WAV_BYTES: &'static [u8] = b"RIFFfake-wav-payload";

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize_to(&self, _text: &str, path: &Path) -> Result<()> {
        *self.last_path.lock().unwrap() = Some(path.to_path_buf());
        tokio::fs::write(path, Self::WAV_BYTES).await?;
        if self.fail {
            return Err(PipelineError::Task("synthesis exploded".to_string()));
        }
        Ok(())
    }
}

pub struct ContextBuilder {
    ctx: StepContext,
}

impl ContextBuilder {
    pub fn rag(mut self, rag: Arc<dyn RagService>) -> Self {
        self.ctx.rag = rag;
        self
    }

    pub fn finetune(mut self, finetune: Arc<dyn FineTuneRunner>) -> Self {
        self.ctx.finetune = finetune;
        self
    }

    pub fn speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.ctx.speech = speech;
        self
    }

    pub fn build(self) -> StepContext {
        std::fs::create_dir_all(&self.ctx.adapters_dir).unwrap();
        std::fs::create_dir_all(&self.ctx.index_root).unwrap();
        std::fs::create_dir_all(&self.ctx.scratch_dir).unwrap();
        self.ctx
    }
}

/// Context whose workers point at the given mock servers; collaborators
/// default to well-behaved fakes.
pub fn test_context(
    text: &MockServer,
    vision: &MockServer,
    image: &MockServer,
    root: &Path,
) -> ContextBuilder {
    ContextBuilder {
        ctx: StepContext {
            text: WorkerClient::new(text.uri()),
            vision: WorkerClient::new(vision.uri()),
            image: WorkerClient::new(image.uri()),
            finetune: Arc::new(NullFineTune),
            rag: Arc::new(StaticRag::default()),
            speech: Arc::new(FakeSpeech::default()),
            budgeter: PromptBudgeter::default(),
            base_model: "test/base-model".to_string(),
            adapters_dir: root.join("adapters"),
            index_root: root.join("indices"),
            scratch_dir: root.join("scratch"),
        },
    }
}

/// Context for steps that never touch a worker endpoint.
pub fn test_context_with_fakes(root: &Path) -> ContextBuilder {
    ContextBuilder {
        ctx: StepContext {
            text: WorkerClient::new("http://127.0.0.1:9"),
            vision: WorkerClient::new("http://127.0.0.1:9"),
            image: WorkerClient::new("http://127.0.0.1:9"),
            finetune: Arc::new(NullFineTune),
            rag: Arc::new(StaticRag::default()),
            speech: Arc::new(FakeSpeech::default()),
            budgeter: PromptBudgeter::default(),
            base_model: "test/base-model".to_string(),
            adapters_dir: root.join("adapters"),
            index_root: root.join("indices"),
            scratch_dir: root.join("scratch"),
        },
    }
}
