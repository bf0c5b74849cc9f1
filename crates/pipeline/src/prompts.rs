//! Fixed instruction templates sent to the model workers.

pub struct StoryPrompts;

impl StoryPrompts {
    /// Analytical instruction for the vision worker.
    pub fn vision_instruction() -> String {
        "You are a visual analyst. Describe this image in 6-10 sentences. \
         Capture scene, setting, characters/objects, emotions, lighting, and style tags. \
         End with a short bullet list of evocative visual motifs."
            .to_string()
    }

    /// Retrieval query built from the scene summary.
    pub fn retrieval_query(scene_summary: &str) -> String {
        format!(
            "Extract 5-7 concrete facts, terms, or setting details relevant to the \
             following scene:\n\n{scene_summary}\n\n\
             Return a compact paragraph with crisp details, no list formatting."
        )
    }

    /// Story prompt assembled from up to three optional blocks in fixed
    /// order, each with its section label, joined by blank lines and closed
    /// with a terminal marker.
    pub fn story(narrative: Option<&str>, scene_summary: &str, kb_snippet: &str) -> String {
        let mut parts = vec![
            "Write a short, vivid story (200-350 words).".to_string(),
            "Use present tense, strong sensory detail, and a coherent arc.".to_string(),
            "Keep it tasteful; avoid gore or disallowed content.".to_string(),
        ];
        if let Some(narrative) = narrative.filter(|n| !n.trim().is_empty()) {
            parts.push(format!("Authoring guidance:\n{narrative}"));
        }
        if !scene_summary.is_empty() {
            parts.push(format!("Image scene summary:\n{scene_summary}"));
        }
        if !kb_snippet.is_empty() {
            parts.push(format!("Context to weave in subtly:\n{kb_snippet}"));
        }
        format!("{}\n\nEND.", parts.join("\n\n"))
    }

    /// Low-temperature keyword extraction instruction for the budgeter.
    pub fn keyword_extraction(source_text: &str, n_terms: usize) -> String {
        format!(
            "Extract concise, evocative keywords or short phrases from the text. \
             Return {n_terms} items, comma-separated, no numbering, no extra words.\n\n\
             {}\n",
            source_text.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_blocks_appear_in_fixed_order() {
        let prompt = StoryPrompts::story(Some("noir tone"), "a rainy street", "the city of Brasov");
        let guidance = prompt.find("Authoring guidance:\nnoir tone").unwrap();
        let scene = prompt.find("Image scene summary:\na rainy street").unwrap();
        let context = prompt
            .find("Context to weave in subtly:\nthe city of Brasov")
            .unwrap();
        assert!(guidance < scene && scene < context);
        assert!(prompt.ends_with("\n\nEND."));
    }

    #[test]
    fn story_omits_absent_blocks() {
        let prompt = StoryPrompts::story(None, "", "");
        assert!(!prompt.contains("Authoring guidance"));
        assert!(!prompt.contains("Image scene summary"));
        assert!(!prompt.contains("Context to weave in subtly"));
        assert!(prompt.starts_with("Write a short, vivid story"));
        assert!(prompt.ends_with("\n\nEND."));
    }

    #[test]
    fn keyword_extraction_names_the_term_count() {
        let prompt = StoryPrompts::keyword_extraction("a harbor", 16);
        assert!(prompt.contains("Return 16 items"));
        assert!(prompt.contains("a harbor"));
    }
}
