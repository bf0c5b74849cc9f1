use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("worker call failed: {0}")]
    Worker(#[from] worker_rpc::WorkerError),

    #[error("fine-tune exited with code {code}: {stderr}")]
    FineTune { code: i32, stderr: String },

    #[error("RAG collaborator failed: {0}")]
    Rag(String),

    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("invalid worker payload: {0}")]
    Payload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("step {step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap an error with the name of the step it aborted.
    pub fn in_step(self, step: &'static str) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The originating cause, unwrapping any step wrapper.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_wrapper_keeps_the_cause() {
        let err = PipelineError::MissingInput("finetune_dataset").in_step("maybe_finetune");
        assert!(err.to_string().contains("maybe_finetune"));
        assert!(matches!(
            err.root(),
            PipelineError::MissingInput("finetune_dataset")
        ));
    }
}
