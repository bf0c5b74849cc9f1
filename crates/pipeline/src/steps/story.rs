use async_trait::async_trait;
use storyloom_core::{StatePatch, StoryState};
use worker_rpc::{GenerateRequest, STORY_TIMEOUT};

use crate::engine::{Step, StepContext};
use crate::error::Result;
use crate::prompts::StoryPrompts;

/// Generates the story from the assembled prompt. Failures here are
/// pipeline-fatal; without a story there is nothing left to produce.
pub struct WriteStory;

#[async_trait]
impl Step for WriteStory {
    fn name(&self) -> &'static str {
        "write_story"
    }

    async fn run(&self, ctx: &StepContext, state: &StoryState) -> Result<StatePatch> {
        let prompt = StoryPrompts::story(
            state.narrative.as_deref(),
            &state.scene_summary,
            &state.kb_snippet,
        );

        let mut request = GenerateRequest::new(prompt).with_sampling(0.7, 0.95, 600);
        if let Some(adapter) = &state.adapter_name {
            request = request.with_adapter(adapter);
        }

        let response = ctx.text.generate_with_timeout(&request, STORY_TIMEOUT).await?;
        Ok(StatePatch {
            story_text: Some(response.text().unwrap_or_default().trim().to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::test_support::{test_context, TestWorkers};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn sent_prompt(request: &Request) -> String {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        body["prompt"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn prompt_carries_blocks_in_order() {
        let workers = TestWorkers::start().await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": " The harbor wakes. "})),
            )
            .mount(&workers.text)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&workers.text, &workers.vision, &workers.image, dir.path()).build();

        let state = StoryState {
            narrative: Some("slow, wistful".to_string()),
            scene_summary: "a mist-covered harbor".to_string(),
            kb_snippet: "the harbor freezes in February".to_string(),
            ..Default::default()
        };
        let patch = WriteStory.run(&ctx, &state).await.unwrap();
        assert_eq!(patch.story_text.as_deref(), Some("The harbor wakes."));

        let requests = workers.text.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let prompt = sent_prompt(&requests[0]);
        let guidance = prompt.find("Authoring guidance:\nslow, wistful").unwrap();
        let scene = prompt
            .find("Image scene summary:\na mist-covered harbor")
            .unwrap();
        let snippet = prompt
            .find("Context to weave in subtly:\nthe harbor freezes in February")
            .unwrap();
        assert!(guidance < scene && scene < snippet);
    }

    #[tokio::test]
    async fn adapter_is_passed_when_present() {
        let workers = TestWorkers::start().await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "ok"})),
            )
            .mount(&workers.text)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&workers.text, &workers.vision, &workers.image, dir.path()).build();

        let state = StoryState {
            adapter_name: Some("story_cafe0123".to_string()),
            ..Default::default()
        };
        WriteStory.run(&ctx, &state).await.unwrap();

        let requests = workers.text.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["adapter_name"], "story_cafe0123");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_new_tokens"], 600);
    }

    #[tokio::test]
    async fn worker_failure_is_fatal() {
        let text = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/worker_generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&text)
            .await;
        let workers = TestWorkers::start().await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(&text, &workers.vision, &workers.image, dir.path()).build();

        let err = WriteStory
            .run(&ctx, &StoryState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Worker(_)));
    }
}
