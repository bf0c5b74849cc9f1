pub mod state;
pub mod worker;

pub use state::{StatePatch, StoryState};
pub use worker::{WorkerEntry, WorkerRegistry, WorkerSpec, WorkerState};
