//! Client for the uniform worker RPC contract.
//!
//! Every model worker (text, vision, image, speech) exposes the same shape:
//! POST a JSON payload to its generate endpoint, get back `{text}` or
//! `{image_url}` or `{audio}`. Timeouts are per call because a story
//! generation legitimately takes minutes while a keyword extraction should
//! not.

pub mod client;
pub mod error;
pub mod types;

pub use client::{
    WorkerClient, DEFAULT_TIMEOUT, IMAGE_TIMEOUT, STORY_TIMEOUT, VISION_TIMEOUT,
};
pub use error::{Result, WorkerError};
pub use types::{GenerateRequest, GenerateResponse};
