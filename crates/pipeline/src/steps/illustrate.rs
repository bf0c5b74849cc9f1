use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use tracing::debug;
use worker_rpc::{GenerateRequest, IMAGE_TIMEOUT};

use crate::engine::{Step, StepContext};
use crate::error::Result;

const DEFAULT_HINT: &str = "cinematic, cohesive color palette, soft light";

/// Generates up to `num_illustrations` images: the first prompt is derived
/// from the scene summary (or the bare style hint when no summary exists),
/// the second (only when more than one image is requested) from the story
/// text, compressed to the token budget and suffixed with the style hint.
///
/// Images are generated sequentially to bound worker load, and any failure
/// aborts the whole step with no partial list. Whether partial results
/// should be kept instead is an open product question.
pub struct Illustrate;

#[async_trait]
impl Step for Illustrate {
    fn name(&self) -> &'static str {
        "illustrate"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        let n = state.num_illustrations.unwrap_or(1).max(1) as usize;
        let hint = state
            .illustration_hint
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HINT);

        let mut prompts = Vec::new();
        if !state.scene_summary.is_empty() {
            let keywords = ctx
                .budgeter
                .compress_to_keywords(&ctx.text, &state.scene_summary)
                .await?;
            let source = if keywords.is_empty() {
                state.scene_summary.as_str()
            } else {
                keywords.as_str()
            };
            prompts.push(ctx.budgeter.finalize(source, hint));
        } else {
            // No scene to draw from; the style hint alone carries the prompt.
            prompts.push(ctx.budgeter.clamp(hint));
        }
        if n > 1 && !state.story_text.is_empty() {
            let keywords = ctx
                .budgeter
                .compress_to_keywords(&ctx.text, &state.story_text)
                .await?;
            let source = if keywords.is_empty() {
                state.story_text.as_str()
            } else {
                keywords.as_str()
            };
            prompts.push(ctx.budgeter.finalize(source, hint));
        }

        // One call at a time: fanning out would multiply diffusion load on a
        // single local GPU.
        let mut images = Vec::new();
        for prompt in prompts.iter().take(n) {
            debug!(
                tokens = crate::budget::approx_token_count(prompt),
                "Generating illustration"
            );
            let response = ctx
                .image
                .generate_with_timeout(&GenerateRequest::new(prompt.clone()), IMAGE_TIMEOUT)
                .await?;
            images.push(response.image_url()?.to_string());
        }

        Ok(StatePatch {
            illustrations: Some(images),
            ..Default::default()
        })
    }
}
