use async_trait::async_trait;
use std::path::Path;
use storyloom_core::{StatePatch, StoryState};
use tracing::info;

use crate::engine::{Step, StepContext};
use crate::error::Result;

const DEFAULT_INDEX_NAME: &str = "default";

/// Resolves the knowledge index for the run. With no documents supplied the
/// index name is explicitly cleared; otherwise a persisted index is reused
/// unless a rebuild is forced or none exists yet.
pub struct MaybeIndex;

#[async_trait]
impl Step for MaybeIndex {
    fn name(&self) -> &'static str {
        "maybe_index"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        if state.rag_docs.is_empty() {
            return Ok(StatePatch {
                rag_index_name: Some(None),
                ..Default::default()
            });
        }

        let index_name = state
            .rag_index_name
            .clone()
            .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());

        let need_build = state.build_index || !index_exists(&ctx.index_root, &index_name);
        if need_build {
            info!(index = %index_name, docs = state.rag_docs.len(), "Building knowledge index");
            ctx.rag.build_index(&index_name, &state.rag_docs).await?;
        } else {
            info!(index = %index_name, "Reusing persisted knowledge index");
        }

        Ok(StatePatch {
            rag_index_name: Some(Some(index_name)),
            ..Default::default()
        })
    }
}

/// A persisted index is the `<name>.faiss` / `<name>.meta.json` pair under
/// the index root. This core consumes the naming scheme, it does not own it.
fn index_exists(index_root: &Path, name: &str) -> bool {
    index_root.join(format!("{name}.faiss")).exists()
        && index_root.join(format!("{name}.meta.json")).exists()
}
