use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use std::path::Path;
use storyloom_core::{StatePatch, StoryState};
use tracing::debug;
use uuid::Uuid;

use crate::engine::{Step, StepContext};
use crate::error::{PipelineError, Result};

/// Narrates the story through the speech collaborator. The collaborator
/// writes a wav to a scratch path; the file is read, base64-encoded into a
/// data URL, and removed on every exit path, success or failure.
pub struct Narrate;

#[async_trait]
impl Step for Narrate {
    fn name(&self) -> &'static str {
        "narrate"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        let text = state.story_text.trim();
        if text.is_empty() {
            return Ok(StatePatch {
                audio: Some(String::new()),
                ..Default::default()
            });
        }

        let scratch = ctx
            .scratch_dir
            .join(format!("{}.wav", Uuid::new_v4().simple()));
        let result = synthesize_and_encode(ctx, text, &scratch).await;

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %scratch.display(), error = %e, "Could not remove narration scratch file");
            }
        }

        Ok(StatePatch {
            audio: Some(format!("data:audio/wav;base64,{}", result?)),
            ..Default::default()
        })
    }
}

async fn synthesize_and_encode(ctx: &StepContext, text: &str, scratch: &Path) -> Result<String> {
    ctx.speech.synthesize_to(text, scratch).await?;
    let bytes = tokio::fs::read(scratch).await?;
    // Encoding a multi-minute wav is real CPU work; keep it off the run task.
    tokio::task::spawn_blocking(move || BASE64_STANDARD.encode(bytes))
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))
}
