use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use tracing::warn;

use crate::engine::{Step, StepContext};
use crate::error::Result;
use crate::prompts::StoryPrompts;

/// Best-effort knowledge enrichment. Pulls a small factual snippet from the
/// resolved index; any retrieval failure degrades to an empty snippet and
/// never aborts the run.
pub struct KbRetrieve;

#[async_trait]
impl Step for KbRetrieve {
    fn name(&self) -> &'static str {
        "kb_retrieve"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        let Some(index_name) = state.rag_index_name.as_deref() else {
            return Ok(StatePatch {
                kb_snippet: Some(String::new()),
                ..Default::default()
            });
        };

        let query = StoryPrompts::retrieval_query(&state.scene_summary);
        let snippet = match ctx.rag.answer(index_name, &query).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(index = %index_name, error = %e, "Knowledge retrieval failed, continuing without snippet");
                String::new()
            }
        };

        Ok(StatePatch {
            kb_snippet: Some(snippet),
            ..Default::default()
        })
    }
}
