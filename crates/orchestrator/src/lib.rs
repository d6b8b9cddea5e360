//! Generation orchestration: the step executor, the continuation loop and the
//! controller that starts, pauses, resumes and resets sessions.

pub mod continuation;
pub mod controller;
pub mod error;
pub mod executor;
pub mod store;
pub mod ticket;

pub use continuation::{ContinuationLoop, LoopOutcome};
pub use controller::{
    ControllerConfig, GenerationController, GenerationHandle, DEFAULT_MAX_STALLED_STEPS,
};
pub use error::{OrchestratorError, Result};
pub use executor::{ContinuationContext, StepExecutor, StepOutcome};
pub use store::{GenerationState, GenerationStore};
pub use ticket::{CancelReason, SessionTicket, SharedGenerationId};
