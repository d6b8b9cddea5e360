//! Step Executor
//!
//! Performs exactly one remote call and shapes the response. It never
//! touches session state or the ledger and never retries on its own;
//! transport errors go straight back to the caller.

use std::sync::Arc;

use templater_client::{
    ContinueGenerateRequest, ContinueGenerateResponse, GenerationService, InitialGenerateRequest,
    InitialGenerateResponse,
};
use templater_core::{Artifact, ArtifactLedger, GenerationSession, SessionInput, SideChannelIds};
use tracing::debug;

use crate::error::{OrchestratorError, Result};

/// Normalized result of one step. `artifact` is `None` when the service
/// answered successfully but generated nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub artifact: Option<Artifact>,
    pub last_processed_unit: u64,
    pub total_units: Option<u64>,
    pub side_channel: Option<SideChannelIds>,
}

impl From<InitialGenerateResponse> for StepOutcome {
    fn from(response: InitialGenerateResponse) -> Self {
        Self {
            artifact: response.artifacts.into_iter().next(),
            last_processed_unit: response.last_processed_unit,
            total_units: Some(response.total_units),
            side_channel: response.side_channel_ids,
        }
    }
}

impl From<ContinueGenerateResponse> for StepOutcome {
    fn from(response: ContinueGenerateResponse) -> Self {
        Self {
            artifact: response.artifacts.into_iter().next(),
            last_processed_unit: response.last_processed_unit,
            total_units: response.total_units,
            side_channel: None,
        }
    }
}

/// What a continuation step needs from the committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationContext {
    pub input: SessionInput,
    pub last_processed_unit: u64,
    pub previous: Artifact,
    pub side_channel: SideChannelIds,
}

impl ContinuationContext {
    pub fn capture(session: &GenerationSession, ledger: &ArtifactLedger) -> Result<Self> {
        let previous = ledger
            .latest()
            .cloned()
            .ok_or_else(|| OrchestratorError::precondition("no previous artifact to continue from"))?;
        let side_channel = session
            .side_channel()
            .cloned()
            .ok_or_else(|| OrchestratorError::precondition("side-channel ids are not bound"))?;

        Ok(Self {
            input: session.input().clone(),
            last_processed_unit: session.last_processed_unit(),
            previous,
            side_channel,
        })
    }

    pub fn request(&self) -> ContinueGenerateRequest {
        let application_ref = self
            .previous
            .application_ref
            .clone()
            .or_else(|| self.side_channel.application_ref.clone());

        ContinueGenerateRequest {
            input_document: self.input.input_document.clone(),
            instructions: self.input.instructions.clone(),
            last_processed_unit: self.last_processed_unit,
            previous_artifact_id: self.previous.id.clone(),
            category_ref: self.previous.category_ref.clone(),
            application_ref,
            domain_hint: self.input.domain_hint.clone(),
            side_channel_ids: self.side_channel.clone(),
        }
    }
}

#[derive(Clone)]
pub struct StepExecutor {
    service: Arc<dyn GenerationService>,
}

impl StepExecutor {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    pub async fn initial(&self, input: &SessionInput) -> Result<StepOutcome> {
        let request = InitialGenerateRequest {
            input_document: input.input_document.clone(),
            instructions: input.instructions.clone(),
            domain_hint: input.domain_hint.clone(),
        };

        let response = self.service.initial_generate(&request).await?;
        debug!(
            artifacts = response.artifacts.len(),
            last_processed_unit = response.last_processed_unit,
            total_units = response.total_units,
            "Initial step returned"
        );
        Ok(response.into())
    }

    pub async fn continuation(&self, context: &ContinuationContext) -> Result<StepOutcome> {
        let response = self.service.continue_generate(&context.request()).await?;
        debug!(
            previous_artifact_id = %context.previous.id,
            artifacts = response.artifacts.len(),
            last_processed_unit = response.last_processed_unit,
            total_units = ?response.total_units,
            "Continuation step returned"
        );
        Ok(response.into())
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor").finish_non_exhaustive()
    }
}
