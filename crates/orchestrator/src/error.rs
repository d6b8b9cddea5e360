use templater_client::ClientError;
use templater_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("A generation session is already running")]
    AlreadyRunning,

    #[error("No generation session is running")]
    NotRunning,

    #[error("No paused generation session to resume")]
    NotPaused,

    #[error("Cannot continue generation: {0}")]
    PreconditionFailed(String),

    #[error("Generation service returned no artifact at unit {last_processed_unit}")]
    EmptyResponse { last_processed_unit: u64 },

    #[error("No progress for {steps} consecutive steps at unit {last_processed_unit}")]
    Stalled { steps: u32, last_processed_unit: u64 },

    #[error("Generation service error: {0}")]
    Remote(#[from] ClientError),

    #[error("Generation task failed: {0}")]
    TaskJoin(String),
}

impl OrchestratorError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionFailed(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
