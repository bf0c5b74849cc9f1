//! Token budgeting for machine-generated image prompts.
//!
//! Image workers sit behind a CLIP-style text encoder with a hard 77-token
//! ceiling; anything beyond it is silently dropped. Prompts built from model
//! output routinely blow past that, so every generated prompt is compressed
//! to a keyword list and then clamped to an approximate token budget (74 by
//! default, leaving a safety margin under the real ceiling).
//!
//! The tokenizer here is intentionally approximate, not the model's own: a
//! maximal run of alphanumerics with an optional internal apostrophe counts
//! as one token, and any other non-space character counts as its own token.

use std::sync::OnceLock;

use regex::Regex;
use worker_rpc::{GenerateRequest, WorkerClient};

use crate::error::Result;
use crate::prompts::StoryPrompts;

/// Default final budget, a cushion under CLIP's 77-token ceiling.
pub const DEFAULT_TOKEN_BUDGET: usize = 74;
/// Soft cap applied to the keyword list before the style hint is appended.
const KEYWORD_SOFT_CAP: usize = 60;
/// Number of phrases the extraction instruction asks for.
const KEYWORD_TERMS: usize = 16;
/// Hard character pre-trim applied before the final token clamp.
const MAX_PROMPT_CHARS: usize = 500;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9]+(?:'[A-Za-z0-9]+)?|[^\sA-Za-z0-9]").expect("valid token pattern")
    })
}

fn whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn comma_spacing() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*,\s*").expect("valid comma pattern"))
}

fn is_alnum(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Split text into approximate tokens after collapsing whitespace.
pub fn approx_tokens(text: &str) -> Vec<String> {
    let text = whitespace().replace_all(text.trim(), " ");
    token_pattern()
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Approximate token count of a prompt.
pub fn approx_token_count(text: &str) -> usize {
    approx_tokens(text).len()
}

/// Literal token-boundary truncation. Alphanumeric tokens are rejoined with
/// single spaces; punctuation reattaches to its neighbor.
pub fn truncate_to_token_budget(text: &str, max_tokens: usize) -> String {
    let tokens = approx_tokens(text);
    if tokens.len() <= max_tokens {
        return text.trim().to_string();
    }

    let mut out = String::new();
    let mut prev_alnum = false;
    for token in tokens.into_iter().take(max_tokens) {
        let alnum = is_alnum(&token);
        if !out.is_empty() && alnum && prev_alnum {
            out.push(' ');
        }
        out.push_str(&token);
        prev_alnum = alnum;
    }
    out.trim().to_string()
}

/// Compresses free-form text into a short, keyword-dense image prompt that
/// never exceeds its token budget.
#[derive(Debug, Clone, Copy)]
pub struct PromptBudgeter {
    budget: usize,
}

impl Default for PromptBudgeter {
    fn default() -> Self {
        Self {
            budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

impl PromptBudgeter {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Ask the text worker, at low temperature, for a short comma-separated
    /// phrase list distilled from the source text. The result is normalized
    /// and soft-capped tighter than the final budget.
    pub async fn compress_to_keywords(
        &self,
        client: &WorkerClient,
        source_text: &str,
    ) -> Result<String> {
        let source = source_text.trim();
        if source.is_empty() {
            return Ok(String::new());
        }

        let request = GenerateRequest::new(StoryPrompts::keyword_extraction(source, KEYWORD_TERMS))
            .with_sampling(0.1, 0.9, 120);
        let response = client.generate(&request).await?;
        let keywords = response.text().unwrap_or_default().trim().to_string();

        let keywords = comma_spacing().replace_all(&keywords, ", ");
        let keywords = whitespace().replace_all(&keywords, " ");
        Ok(truncate_to_token_budget(&keywords, KEYWORD_SOFT_CAP))
    }

    /// Join compressed phrases with the style hint and clamp the result to
    /// the final budget. Output never exceeds `self.budget` as measured by
    /// the approximate tokenizer.
    pub fn finalize(&self, keywords: &str, hint: &str) -> String {
        let joined = format!("{keywords}, {hint}");
        let mut prompt = joined
            .trim_matches(|c: char| c == ',' || c == ' ')
            .to_string();

        // Hard character pre-trim to defang pathological inputs.
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            prompt = prompt.chars().take(MAX_PROMPT_CHARS).collect();
            prompt = prompt.trim_end().to_string();
        }

        self.clamp(&prompt)
    }

    /// Last line of defense: drop trailing comma-separated chunks until the
    /// prompt fits the budget, falling back to a literal token truncation if
    /// a single chunk still exceeds it.
    pub fn clamp(&self, text: &str) -> String {
        let mut pieces: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if pieces.is_empty() {
            return truncate_to_token_budget(text, self.budget);
        }

        let mut current = pieces.join(", ");
        while approx_token_count(&current) > self.budget && pieces.len() > 1 {
            pieces.pop();
            current = pieces.join(", ");
        }
        if approx_token_count(&current) > self.budget {
            current = truncate_to_token_budget(&current, self.budget);
        }
        current.trim().to_string()
    }
}
