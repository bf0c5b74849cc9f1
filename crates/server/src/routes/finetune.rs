use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use pipeline::{FineTuneRunner as _, FineTuneSpec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FineTuneRequest {
    /// File name under the datasets directory.
    pub dataset: String,
    pub adapter_name: Option<String>,
    #[serde(default = "default_epochs")]
    pub num_epochs: u32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_lora_r")]
    pub lora_r: u32,
    #[serde(default = "default_lora_alpha")]
    pub lora_alpha: u32,
    #[serde(default = "default_lora_dropout")]
    pub lora_dropout: f64,
}

fn default_epochs() -> u32 {
    3
}
fn default_learning_rate() -> f64 {
    2e-4
}
fn default_lora_r() -> u32 {
    8
}
fn default_lora_alpha() -> u32 {
    16
}
fn default_lora_dropout() -> f64 {
    0.05
}

#[derive(Serialize)]
pub struct FineTuneResponse {
    pub adapter_name: String,
}

/// Run one training job to completion against a named dataset.
pub async fn start_finetune(
    State(state): State<AppState>,
    Json(payload): Json<FineTuneRequest>,
) -> Result<(StatusCode, Json<FineTuneResponse>), AppError> {
    let train_file = state.config.paths.datasets_dir.join(&payload.dataset);
    if !tokio::fs::try_exists(&train_file).await.unwrap_or(false) {
        return Err(AppError::NotFound(format!(
            "Dataset not found: {}",
            payload.dataset
        )));
    }

    let adapter_name = payload
        .adapter_name
        .unwrap_or_else(|| format!("story_{}", &Uuid::new_v4().simple().to_string()[..8]));
    let output_dir = state.config.paths.adapters_dir.join(&adapter_name);
    tokio::fs::create_dir_all(&state.config.paths.adapters_dir).await?;

    let spec = FineTuneSpec {
        base_model: state.ctx.base_model.clone(),
        train_file: train_file.to_string_lossy().into_owned(),
        output_dir,
        num_epochs: payload.num_epochs,
        learning_rate: payload.learning_rate,
        lora_r: payload.lora_r,
        lora_alpha: payload.lora_alpha,
        lora_dropout: payload.lora_dropout,
    };
    state.ctx.finetune.run(&spec).await?;

    Ok((StatusCode::CREATED, Json(FineTuneResponse { adapter_name })))
}
