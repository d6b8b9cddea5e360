//! Event system for template generation
//!
//! Progress, artifact and lifecycle events published by the orchestrator and
//! streamed to clients.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
