use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use tracing::info;
use uuid::Uuid;

use crate::collaborators::FineTuneSpec;
use crate::engine::{Step, StepContext};
use crate::error::{PipelineError, Result};

const DEFAULT_EPOCHS: u32 = 3;
const DEFAULT_LEARNING_RATE: f64 = 2e-4;
const DEFAULT_LORA_R: u32 = 8;
const DEFAULT_LORA_ALPHA: u32 = 16;
const DEFAULT_LORA_DROPOUT: f64 = 0.05;

/// Runs LoRA fine-tuning when requested. An adapter directory that already
/// holds artifacts is reused without a second training invocation; a failed
/// training run is pipeline-fatal.
pub struct MaybeFinetune;

#[async_trait]
impl Step for MaybeFinetune {
    fn name(&self) -> &'static str {
        "maybe_finetune"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        if !state.finetune {
            return Ok(StatePatch::empty());
        }

        let adapter_name = state
            .adapter_name
            .clone()
            .unwrap_or_else(|| format!("story_{}", &Uuid::new_v4().simple().to_string()[..8]));
        let output_dir = ctx.adapters_dir.join(&adapter_name);
        tokio::fs::create_dir_all(&ctx.adapters_dir).await?;

        if dir_has_entries(&output_dir).await {
            info!(adapter = %adapter_name, "Adapter already trained, reusing");
            return Ok(StatePatch {
                adapter_name: Some(adapter_name),
                ..Default::default()
            });
        }

        let train_file = state
            .finetune_dataset
            .clone()
            .ok_or(PipelineError::MissingInput("finetune_dataset"))?;

        let spec = FineTuneSpec {
            base_model: ctx.base_model.clone(),
            train_file,
            output_dir,
            num_epochs: state.num_epochs.unwrap_or(DEFAULT_EPOCHS),
            learning_rate: state.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            lora_r: state.lora_r.unwrap_or(DEFAULT_LORA_R),
            lora_alpha: state.lora_alpha.unwrap_or(DEFAULT_LORA_ALPHA),
            lora_dropout: state.lora_dropout.unwrap_or(DEFAULT_LORA_DROPOUT),
        };
        ctx.finetune.run(&spec).await?;

        Ok(StatePatch {
            adapter_name: Some(adapter_name),
            ..Default::default()
        })
    }
}

async fn dir_has_entries(dir: &std::path::Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => entries.next_entry().await.ok().flatten().is_some(),
        Err(_) => false,
    }
}
