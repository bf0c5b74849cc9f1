use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use worker_rpc::{GenerateRequest, VISION_TIMEOUT};

use crate::engine::{Step, StepContext};
use crate::error::Result;
use crate::prompts::StoryPrompts;

/// Describes the seed image with the vision worker. Without a seed image the
/// scene summary is explicitly set to the empty string.
pub struct VisionDescribe;

#[async_trait]
impl Step for VisionDescribe {
    fn name(&self) -> &'static str {
        "vision_describe"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        let Some(image) = state.image.as_deref() else {
            return Ok(StatePatch {
                scene_summary: Some(String::new()),
                ..Default::default()
            });
        };

        let request = GenerateRequest::new(StoryPrompts::vision_instruction())
            .with_image(image)
            .with_sampling(0.2, 0.9, 320);
        let response = ctx.vision.generate_with_timeout(&request, VISION_TIMEOUT).await?;
        let summary = response.text().unwrap_or_default().trim().to_string();

        Ok(StatePatch {
            scene_summary: Some(summary),
            ..Default::default()
        })
    }
}
