use serde::{Deserialize, Serialize};

/// The run-state record threaded through the story pipeline.
///
/// Every field is independently optional: callers supply any subset of the
/// input fields, and each output field stays at its zero value until the
/// step that owns it has run. Steps must tolerate the absence of any field
/// they did not produce themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryState {
    // Inputs
    /// High-level authoring guidance for style, tone, and point of view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Optional seed image as a data URL or http(s) URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Local file paths to index as knowledge documents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rag_docs: Vec<String>,
    /// Name of the vector index to build or reuse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_index_name: Option<String>,
    /// Force a rebuild of the index even if one is persisted.
    #[serde(default)]
    pub build_index: bool,

    /// Whether to run LoRA fine-tuning before writing.
    #[serde(default)]
    pub finetune: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finetune_dataset: Option<String>,
    /// Adapter directory name; generated when absent and fine-tuning runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_epochs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_r: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_alpha: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_dropout: Option<f64>,

    /// Number of illustrations to generate (clamped to at least 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_illustrations: Option<u32>,
    /// Optional style hint suffixed onto every illustration prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustration_hint: Option<String>,

    // Outputs
    /// Vision worker's description of the seed image; empty if none was given.
    #[serde(default)]
    pub scene_summary: String,
    /// Best-effort knowledge snippet retrieved from the index.
    #[serde(default)]
    pub kb_snippet: String,
    /// The generated story.
    #[serde(default)]
    pub story_text: String,
    /// Generated illustrations as `data:image/png;base64,...` URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub illustrations: Vec<String>,
    /// Narrated story as a `data:audio/wav;base64,...` URL.
    #[serde(default)]
    pub audio: String,
}

/// Partial update produced by one pipeline step.
///
/// `None` leaves the state field untouched; `Some` overwrites it. The
/// `rag_index_name` field carries one extra level so the indexing step can
/// explicitly clear it (`Some(None)`) when no documents were supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub adapter_name: Option<String>,
    pub rag_index_name: Option<Option<String>>,
    pub scene_summary: Option<String>,
    pub kb_snippet: Option<String>,
    pub story_text: Option<String>,
    pub illustrations: Option<Vec<String>>,
    pub audio: Option<String>,
}

impl StatePatch {
    /// The explicit no-op patch returned by a step whose precondition is unmet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl StoryState {
    /// Merge a step's patch into the state. Patched fields overwrite, all
    /// other fields persist.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(adapter) = patch.adapter_name {
            self.adapter_name = Some(adapter);
        }
        if let Some(index) = patch.rag_index_name {
            self.rag_index_name = index;
        }
        if let Some(summary) = patch.scene_summary {
            self.scene_summary = summary;
        }
        if let Some(snippet) = patch.kb_snippet {
            self.kb_snippet = snippet;
        }
        if let Some(story) = patch.story_text {
            self.story_text = story;
        }
        if let Some(images) = patch.illustrations {
            self.illustrations = images;
        }
        if let Some(audio) = patch.audio {
            self.audio = audio;
        }
    }
}
