//! Conditional multi-stage story pipeline.
//!
//! A run threads one [`StoryState`](storyloom_core::StoryState) through a
//! fixed, linear chain of steps. Each step reads the current state, produces
//! a partial patch, and the engine merges the patch before the next step
//! runs. Steps whose preconditions are unmet return an explicit empty patch
//! rather than being skipped structurally, which keeps the chain auditable.

pub mod budget;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod steps;

pub use budget::PromptBudgeter;
pub use collaborators::{
    FineTuneRunner, FineTuneSpec, HttpRagService, RagService, SpeechSynthesizer,
    SubprocessFineTune, WorkerSpeech,
};
pub use engine::{Step, StepContext, StoryPipeline};
pub use error::{PipelineError, Result};

#[cfg(test)]
pub(crate) mod test_support;
