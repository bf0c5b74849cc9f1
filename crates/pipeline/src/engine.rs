//! The pipeline engine: a fixed, linear chain of steps over one run-state.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use tracing::{debug, info};
use worker_rpc::WorkerClient;

use crate::collaborators::{FineTuneRunner, RagService, SpeechSynthesizer};
use crate::error::Result;
use crate::steps;
use crate::PromptBudgeter;

/// One pipeline step: a pure function of the current run-state producing a
/// partial patch. A step whose precondition is unmet returns an explicit
/// empty patch; it is never skipped structurally.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch>;
}

/// Everything a step may reach: worker clients, collaborators, paths, and
/// the prompt budgeter. Injected rather than ambient, so tests can swap any
/// seam independently.
pub struct StepContext {
    pub text: WorkerClient,
    pub vision: WorkerClient,
    pub image: WorkerClient,
    pub finetune: Arc<dyn FineTuneRunner>,
    pub rag: Arc<dyn RagService>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub budgeter: PromptBudgeter,
    /// Base model id passed to the fine-tune collaborator.
    pub base_model: String,
    /// Directory holding `adapters/<name>` outputs.
    pub adapters_dir: PathBuf,
    /// Directory holding `<name>.faiss` / `<name>.meta.json` index files.
    pub index_root: PathBuf,
    /// Directory for transient narration artifacts.
    pub scratch_dir: PathBuf,
}

/// The story pipeline: seven steps in fixed order, one shared run-state.
///
/// Each submission runs its steps strictly sequentially inside the calling
/// task; no step begins before the previous patch is merged. Independent
/// submissions may run concurrently and share only the worker set. The
/// engine performs no admission control of its own; backpressure, if any,
/// comes from the workers.
pub struct StoryPipeline {
    ctx: Arc<StepContext>,
    steps: Vec<Box<dyn Step>>,
}

impl StoryPipeline {
    /// The standard seven-step chain.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self::with_steps(
            ctx,
            vec![
                Box::new(steps::MaybeFinetune),
                Box::new(steps::MaybeIndex),
                Box::new(steps::VisionDescribe),
                Box::new(steps::KbRetrieve),
                Box::new(steps::WriteStory),
                Box::new(steps::Illustrate),
                Box::new(steps::Narrate),
            ],
        )
    }

    pub fn with_steps(ctx: Arc<StepContext>, steps: Vec<Box<dyn Step>>) -> Self {
        Self { ctx, steps }
    }

    /// Run a submission through the chain and return the final run-state.
    ///
    /// A fatal step error aborts the remaining chain and is surfaced with
    /// the originating cause; best-effort steps absorb their own failures
    /// before returning.
    pub async fn submit(&self, mut state: StoryState) -> Result<StoryState> {
        for step in &self.steps {
            debug!(step = step.name(), "Running pipeline step");
            let patch = step
                .run(&self.ctx, &state)
                .await
                .map_err(|e| e.in_step(step.name()))?;
            info!(
                step = step.name(),
                no_op = patch.is_empty(),
                "Pipeline step completed"
            );
            state.apply(patch);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, FakeSpeech, NullFineTune, StaticRag};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_worker(response: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn text_only_run_produces_story_and_audio() {
        let text = mock_worker(serde_json::json!({"text": "  Once upon a time.  "})).await;
        let vision = MockServer::start().await;
        let image = mock_worker(serde_json::json!({"image_url": "data:image/png;base64,AA=="}))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&text, &vision, &image, dir.path())
            .rag(Arc::new(StaticRag::default()))
            .finetune(Arc::new(NullFineTune::default()))
            .speech(Arc::new(FakeSpeech::default()))
            .build();

        let pipeline = StoryPipeline::new(Arc::new(ctx));
        let state = StoryState {
            narrative: Some("a quiet harbor at dawn".to_string()),
            ..Default::default()
        };
        let result = pipeline.submit(state).await.unwrap();

        assert_eq!(result.scene_summary, "");
        assert_eq!(result.kb_snippet, "");
        assert_eq!(result.story_text, "Once upon a time.");
        assert!(result.audio.starts_with("data:audio/wav;base64,"));
        // No seed image: the single illustration comes from the hint alone.
        assert_eq!(result.illustrations.len(), 1);
        assert!(vision.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seed_image_run_describes_and_illustrates() {
        let text = mock_worker(serde_json::json!({"text": "misty harbor, lone gull"})).await;
        let vision = mock_worker(serde_json::json!({"text": "A mist-covered harbor."})).await;
        let image = mock_worker(serde_json::json!({"image_url": "data:image/png;base64,AA=="}))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&text, &vision, &image, dir.path()).build();
        let pipeline = StoryPipeline::new(Arc::new(ctx));

        let state = StoryState {
            image: Some("data:image/png;base64,seed".to_string()),
            num_illustrations: Some(1),
            ..Default::default()
        };
        let result = pipeline.submit(state).await.unwrap();

        assert_eq!(result.scene_summary, "A mist-covered harbor.");
        assert_eq!(result.illustrations.len(), 1);
        assert_eq!(image.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn story_failure_is_fatal_and_skips_illustrations() {
        // The text worker fails every call, so write_story aborts the run.
        let text = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&text)
            .await;
        let vision = mock_worker(serde_json::json!({"text": "A mist-covered harbor."})).await;
        let image = mock_worker(serde_json::json!({"image_url": "data:image/png;base64,AA=="}))
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&text, &vision, &image, dir.path()).build();
        let pipeline = StoryPipeline::new(Arc::new(ctx));

        let state = StoryState {
            image: Some("data:image/png;base64,seed".to_string()),
            num_illustrations: Some(1),
            ..Default::default()
        };
        let err = pipeline.submit(state).await.unwrap_err();
        assert!(err.to_string().contains("write_story"));
        assert!(image.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adapter_name_is_forwarded_to_the_text_worker() {
        let text = MockServer::start().await;
        // Keyword extraction and story calls both hit the text worker; only
        // the story call carries the adapter.
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .and(body_partial_json(
                serde_json::json!({"adapter_name": "story_cafe0123"}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "A story."})),
            )
            .mount(&text)
            .await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "keywords"})),
            )
            .mount(&text)
            .await;
        let vision = MockServer::start().await;
        let image = mock_worker(serde_json::json!({"image_url": "data:image/png;base64,AA=="}))
            .await;

        let dir = tempfile::tempdir().unwrap();
        // Pre-populate the adapter dir so maybe_finetune reuses it.
        let adapter_dir = dir.path().join("adapters").join("story_cafe0123");
        std::fs::create_dir_all(&adapter_dir).unwrap();
        std::fs::write(adapter_dir.join("adapter.safetensors"), b"weights").unwrap();

        let ctx = test_context(&text, &vision, &image, dir.path()).build();
        let pipeline = StoryPipeline::new(Arc::new(ctx));

        let state = StoryState {
            finetune: true,
            adapter_name: Some("story_cafe0123".to_string()),
            finetune_dataset: Some("datasets/alpaca.json".to_string()),
            ..Default::default()
        };
        let result = pipeline.submit(state).await.unwrap();
        assert_eq!(result.story_text, "A story.");
        assert_eq!(result.adapter_name.as_deref(), Some("story_cafe0123"));
    }
}
