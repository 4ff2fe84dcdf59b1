//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Process timed out after {0} seconds")]
    StepTimeout(u64),

    #[error("{0}")]
    StepFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] vpipe_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn step_failed(msg: impl Into<String>) -> Self {
        Self::StepFailed(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::StepTimeout(_))
    }
}
