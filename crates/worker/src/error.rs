use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("worker returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("worker response missing expected field: {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
