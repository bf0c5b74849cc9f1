use axum::extract::State;
use axum::Json;
use storyloom_core::StoryState;

use crate::error::AppError;
use crate::state::AppState;

/// Run one submission through the full pipeline and return the final
/// run-state, outputs included.
pub async fn create_story(
    State(state): State<AppState>,
    Json(payload): Json<StoryState>,
) -> Result<Json<StoryState>, AppError> {
    if payload.narrative.as_deref().map_or(true, |n| n.trim().is_empty())
        && payload.image.is_none()
    {
        return Err(AppError::BadRequest(
            "Submission needs a narrative or a seed image".to_string(),
        ));
    }

    let result = state.pipeline.submit(payload).await?;
    Ok(Json(result))
}
