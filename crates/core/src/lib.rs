//! Domain model for template generation sessions.
//!
//! Pure data and transition rules, no I/O: the artifact ledger, the session
//! state machine and the values exchanged with callers.

pub mod domain;
pub mod error;

pub use domain::artifact::{Artifact, ArtifactLedger, EntityId};
pub use domain::session::{
    progress_percent, GenerationSession, GenerationSnapshot, ProgressUpdate, ResumePoint,
    SessionInput, SideChannelIds,
};
pub use domain::status::{GenerationStateMachine, GenerationStatus};
pub use error::{CoreError, Result};
