use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactLedger, EntityId};
use super::status::{GenerationStateMachine, GenerationStatus};
use crate::error::{CoreError, Result};

/// What the caller hands over when starting a generation. Immutable for the
/// lifetime of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInput {
    pub input_document: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub domain_hint: String,
}

impl SessionInput {
    pub fn new(
        input_document: impl Into<String>,
        instructions: impl Into<String>,
        domain_hint: impl Into<String>,
    ) -> Self {
        Self {
            input_document: input_document.into(),
            instructions: instructions.into(),
            domain_hint: domain_hint.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_document.trim().is_empty() {
            return Err(CoreError::Validation(
                "input document must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entities the service creates during the first call of a session and
/// expects to be handed back, unchanged, on every later call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideChannelIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_ref: Option<EntityId>,
    #[serde(default)]
    pub category_refs: Vec<EntityId>,
}

impl SideChannelIds {
    pub fn new(application_ref: impl Into<EntityId>) -> Self {
        Self {
            application_ref: Some(application_ref.into()),
            category_refs: Vec::new(),
        }
    }

    pub fn with_categories(mut self, category_refs: Vec<EntityId>) -> Self {
        self.category_refs = category_refs;
        self
    }
}

/// Outcome of folding one response's counters into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// `last_processed_unit` moved forward.
    pub advanced: bool,
    /// The response reported a lower `last_processed_unit`; it was ignored.
    pub regressed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    id: Uuid,
    generation: u64,
    status: GenerationStatus,
    input: SessionInput,
    total_units: u64,
    last_processed_unit: u64,
    status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    side_channel: Option<SideChannelIds>,
    cancel_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::idle(0)
    }
}

impl GenerationSession {
    pub fn idle(generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            status: GenerationStatus::Idle,
            input: SessionInput::default(),
            total_units: 0,
            last_processed_unit: 0,
            status_message: String::new(),
            side_channel: None,
            cancel_requested: false,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Starts a fresh session in place of `current`.
    ///
    /// Counters start at zero and no side-channel ids are bound. Refused while
    /// `current` is still generating.
    pub fn start(current: &GenerationSession, generation: u64, input: SessionInput) -> Result<Self> {
        if !GenerationStateMachine::can_start(&current.status) {
            return Err(CoreError::AlreadyGenerating);
        }
        input.validate()?;

        let mut session = Self::idle(generation);
        session.transition(GenerationStatus::Generating)?;
        session.input = input;
        session.status_message = "Starting generation...".to_string();
        session.started_at = Some(Utc::now());
        Ok(session)
    }

    /// Starts a new session that picks up where a paused one stopped.
    pub fn resume(current: &GenerationSession, generation: u64, point: &ResumePoint) -> Result<Self> {
        point.validate()?;

        let mut session = Self::start(current, generation, point.input.clone())?;
        session.bind_side_channel(point.side_channel.clone())?;
        session.apply_progress(point.last_processed_unit, Some(point.total_units));
        session.status_message = format!(
            "Resuming from unit {} of {}",
            point.last_processed_unit, point.total_units
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn input(&self) -> &SessionInput {
        &self.input
    }

    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    pub fn last_processed_unit(&self) -> u64 {
        self.last_processed_unit
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn side_channel(&self) -> Option<&SideChannelIds> {
        self.side_channel.as_ref()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.last_processed_unit, self.total_units)
    }

    /// Whether the whole document has been processed.
    pub fn is_fully_processed(&self) -> bool {
        self.total_units > 0 && self.last_processed_unit >= self.total_units
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Binds the side-channel ids. Allowed once per session, and only with
    /// an application reference present.
    pub fn bind_side_channel(&mut self, ids: SideChannelIds) -> Result<()> {
        if self.side_channel.is_some() {
            return Err(CoreError::SideChannelAlreadyBound);
        }
        if ids.application_ref.is_none() {
            return Err(CoreError::MissingApplicationRef);
        }
        self.side_channel = Some(ids);
        Ok(())
    }

    /// Folds a response's counters into the session.
    ///
    /// `total_units` only ever grows and ignores non-positive values;
    /// `last_processed_unit` never moves backwards.
    pub fn apply_progress(&mut self, last_processed_unit: u64, total_units: Option<u64>) -> ProgressUpdate {
        if let Some(total) = total_units.filter(|t| *t > 0) {
            self.total_units = self.total_units.max(total);
        }

        let regressed = last_processed_unit < self.last_processed_unit;
        let advanced = last_processed_unit > self.last_processed_unit;
        if advanced {
            self.last_processed_unit = last_processed_unit;
        }

        ProgressUpdate {
            advanced,
            regressed,
        }
    }

    /// Records a pause request. The status itself flips only once the loop
    /// has committed its in-flight step.
    pub fn request_cancel(&mut self) -> Result<()> {
        GenerationStateMachine::validate_transition(&self.status, &GenerationStatus::Paused)?;
        self.cancel_requested = true;
        self.status_message = "Pausing after the current step...".to_string();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(GenerationStatus::Paused)?;
        self.status_message = format!(
            "Paused at unit {} of {}",
            self.last_processed_unit, self.total_units
        );
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        if !self.is_fully_processed() {
            return Err(CoreError::Incomplete {
                last_processed_unit: self.last_processed_unit,
                total_units: self.total_units,
            });
        }
        self.transition(GenerationStatus::Completed)?;
        self.status_message = "Generation complete".to_string();
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(GenerationStatus::Failed)?;
        let error = error.into();
        self.status_message = format!("Generation failed: {}", error);
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Replaces this session with an empty idle one under `generation`.
    pub fn reset(&mut self, generation: u64) {
        *self = Self::idle(generation);
    }

    fn transition(&mut self, to: GenerationStatus) -> Result<()> {
        GenerationStateMachine::validate_transition(&self.status, &to)?;
        self.status = to;
        Ok(())
    }
}

/// `clamp(round(last / total * 100), 0, 100)`, or 0 while the total is unknown.
pub fn progress_percent(last_processed_unit: u64, total_units: u64) -> u8 {
    if total_units == 0 {
        return 0;
    }
    let percent = (last_processed_unit as f64 / total_units as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Everything needed to start a new session that continues a paused one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub input: SessionInput,
    pub last_processed_unit: u64,
    pub total_units: u64,
    pub side_channel: SideChannelIds,
    pub previous: Artifact,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl ResumePoint {
    pub fn capture(session: &GenerationSession, ledger: &ArtifactLedger) -> Result<Self> {
        let side_channel = session
            .side_channel()
            .cloned()
            .ok_or(CoreError::MissingApplicationRef)?;
        let previous = ledger.latest().cloned().ok_or_else(|| {
            CoreError::Validation("no artifact has been generated yet".to_string())
        })?;

        Ok(Self {
            input: session.input().clone(),
            last_processed_unit: session.last_processed_unit(),
            total_units: session.total_units(),
            side_channel,
            previous,
            artifacts: ledger.items().to_vec(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.side_channel.application_ref.is_none() {
            return Err(CoreError::MissingApplicationRef);
        }
        self.input.validate()
    }

    pub fn ledger(&self) -> ArtifactLedger {
        ArtifactLedger::seeded(self.artifacts.clone(), Some(self.previous.clone()))
    }
}

/// Read-only view handed to callers for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSnapshot {
    pub session: GenerationSession,
    pub progress_percent: u8,
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<Artifact>,
}

impl GenerationSnapshot {
    pub fn capture(session: &GenerationSession, ledger: &ArtifactLedger) -> Self {
        Self {
            session: session.clone(),
            progress_percent: session.progress_percent(),
            artifacts: ledger.items().to_vec(),
            latest: ledger.latest().cloned(),
        }
    }
}
