use std::path::Path;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<String>,
}

#[derive(Serialize)]
pub struct AdaptersResponse {
    pub adapters: Vec<String>,
}

/// Training files available for fine-tuning, by file name. Only json and
/// jsonl files count; anything else in the directory is ignored.
pub async fn list_datasets(
    State(state): State<AppState>,
) -> Result<Json<DatasetsResponse>, AppError> {
    let mut datasets = list_entries(&state.config.paths.datasets_dir, |file_type| {
        file_type.is_file()
    })
    .await?;
    datasets.retain(|name| name.ends_with(".json") || name.ends_with(".jsonl"));
    Ok(Json(DatasetsResponse { datasets }))
}

/// Trained adapters, by directory name.
pub async fn list_adapters(
    State(state): State<AppState>,
) -> Result<Json<AdaptersResponse>, AppError> {
    let adapters = list_entries(&state.config.paths.adapters_dir, |file_type| {
        file_type.is_dir()
    })
    .await?;
    Ok(Json(AdaptersResponse { adapters }))
}

/// Sorted names of matching directory entries; a missing directory is an
/// empty listing, not an error.
async fn list_entries(
    dir: &Path,
    keep: impl Fn(&std::fs::FileType) -> bool,
) -> Result<Vec<String>, AppError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if keep(&file_type) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
