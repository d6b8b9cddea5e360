//! Event types published while a generation session runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A session entered `generating`, either fresh or resumed
    #[serde(rename = "generation.started")]
    GenerationStarted {
        session_id: Uuid,
        generation: u64,
        resumed: bool,
    },

    /// Counters changed after a committed step
    #[serde(rename = "generation.progress")]
    GenerationProgress {
        session_id: Uuid,
        last_processed_unit: u64,
        total_units: u64,
        progress_percent: u8,
        message: String,
    },

    /// An artifact was recorded into the ledger
    #[serde(rename = "artifact.recorded")]
    ArtifactRecorded {
        session_id: Uuid,
        artifact_id: String,
        name: String,
        /// `false` when the id was already present and only `latest` moved
        is_new: bool,
    },

    #[serde(rename = "generation.paused")]
    GenerationPaused {
        session_id: Uuid,
        last_processed_unit: u64,
    },

    #[serde(rename = "generation.completed")]
    GenerationCompleted {
        session_id: Uuid,
        artifact_count: usize,
    },

    #[serde(rename = "generation.failed")]
    GenerationFailed { session_id: Uuid, error: String },

    /// The active session was discarded
    #[serde(rename = "generation.reset")]
    GenerationReset { generation: u64 },
}

impl Event {
    /// Get the session ID associated with this event, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Event::GenerationStarted { session_id, .. } => Some(*session_id),
            Event::GenerationProgress { session_id, .. } => Some(*session_id),
            Event::ArtifactRecorded { session_id, .. } => Some(*session_id),
            Event::GenerationPaused { session_id, .. } => Some(*session_id),
            Event::GenerationCompleted { session_id, .. } => Some(*session_id),
            Event::GenerationFailed { session_id, .. } => Some(*session_id),
            Event::GenerationReset { .. } => None,
        }
    }

    /// SSE event name, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Event::GenerationStarted { .. } => "generation.started",
            Event::GenerationProgress { .. } => "generation.progress",
            Event::ArtifactRecorded { .. } => "artifact.recorded",
            Event::GenerationPaused { .. } => "generation.paused",
            Event::GenerationCompleted { .. } => "generation.completed",
            Event::GenerationFailed { .. } => "generation.failed",
            Event::GenerationReset { .. } => "generation.reset",
        }
    }
}
