//! Continuation Loop
//!
//! Drives one session from its first artifact to the end of the document,
//! one continuation call at a time. Cancellation is cooperative: the ticket is
//! consulted right after every commit and right before every call, and a
//! call already in flight always gets its result committed.
//!
//! Events are published while the commit still holds the store lock, so a
//! reset can never be observed ahead of the older session's last event.

use events::{Event, EventBus};
use templater_core::{Artifact, GenerationStatus, ProgressUpdate};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::executor::{ContinuationContext, StepExecutor, StepOutcome};
use crate::store::{GenerationState, GenerationStore};
use crate::ticket::{CancelReason, SessionTicket};

/// How a loop that did not fail came to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Completed,
    Paused,
    /// A reset or newer session took over; nothing more was written.
    Superseded,
}

enum Checkpoint {
    Continue(Box<ContinuationContext>),
    Completed { session_id: Uuid, artifact_count: usize },
    Paused { session_id: Uuid, last_processed_unit: u64 },
}

struct CommittedStep {
    session_id: Uuid,
    artifact: Artifact,
    is_new: bool,
    update: ProgressUpdate,
    last_processed_unit: u64,
    total_units: u64,
    progress_percent: u8,
    message: String,
}

pub struct ContinuationLoop {
    executor: StepExecutor,
    store: GenerationStore,
    ticket: SessionTicket,
    event_bus: Option<EventBus>,
    max_stalled_steps: u32,
}

impl ContinuationLoop {
    pub fn new(executor: StepExecutor, store: GenerationStore, ticket: SessionTicket) -> Self {
        Self {
            executor,
            store,
            ticket,
            event_bus: None,
            max_stalled_steps: 0,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Option<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Consecutive non-advancing steps tolerated before failing; 0 disables.
    pub fn with_max_stalled_steps(mut self, max_stalled_steps: u32) -> Self {
        self.max_stalled_steps = max_stalled_steps;
        self
    }

    pub fn generation(&self) -> u64 {
        self.ticket.generation()
    }

    /// Runs a fresh session from the outcome of its initial step.
    ///
    /// The initial step must have produced an artifact and an application
    /// reference, otherwise the session fails without a single continuation
    /// call.
    pub async fn run(self, initial: StepOutcome) -> Result<LoopOutcome> {
        let Some(artifact) = initial.artifact else {
            return self
                .fail(OrchestratorError::precondition(
                    "initial step produced no artifact",
                ))
                .await;
        };
        let Some(side_channel) = initial
            .side_channel
            .filter(|ids| ids.application_ref.is_some())
        else {
            return self
                .fail(OrchestratorError::precondition(
                    "initial step returned no application reference",
                ))
                .await;
        };

        let committed = self
            .store
            .commit(&self.ticket, "initial step", |state| -> Result<CommittedStep> {
                state.session.bind_side_channel(side_channel)?;
                let step = record_step(
                    state,
                    artifact,
                    initial.last_processed_unit,
                    initial.total_units,
                );
                self.emit_step(&step);
                Ok(step)
            })
            .await;

        match committed {
            None => return Ok(LoopOutcome::Superseded),
            Some(Err(e)) => return self.fail(e).await,
            Some(Ok(step)) => {
                info!(
                    generation = self.ticket.generation(),
                    session_id = %step.session_id,
                    artifact_id = %step.artifact.id,
                    last_processed_unit = step.last_processed_unit,
                    total_units = step.total_units,
                    "Initial step committed, entering continuation loop"
                );
            }
        }

        self.drive().await
    }

    /// Continues a session that was installed from a resume point.
    pub async fn resume(self) -> Result<LoopOutcome> {
        info!(
            generation = self.ticket.generation(),
            "Resuming continuation loop"
        );
        self.drive().await
    }

    async fn drive(&self) -> Result<LoopOutcome> {
        let mut stalled_steps: u32 = 0;

        loop {
            // Serves as the post-commit check of the previous step and the
            // pre-call check of the next one.
            let context = match self.checkpoint().await {
                Ok(Some(Checkpoint::Continue(context))) => context,
                Ok(Some(Checkpoint::Completed {
                    session_id,
                    artifact_count,
                })) => {
                    info!(
                        generation = self.ticket.generation(),
                        session_id = %session_id,
                        artifact_count = artifact_count,
                        "Generation complete"
                    );
                    return Ok(LoopOutcome::Completed);
                }
                Ok(Some(Checkpoint::Paused {
                    session_id,
                    last_processed_unit,
                })) => {
                    info!(
                        generation = self.ticket.generation(),
                        session_id = %session_id,
                        last_processed_unit = last_processed_unit,
                        "Generation paused"
                    );
                    return Ok(LoopOutcome::Paused);
                }
                Ok(None) => {
                    debug!(
                        generation = self.ticket.generation(),
                        "Loop superseded, stopping"
                    );
                    return Ok(LoopOutcome::Superseded);
                }
                Err(e) => return self.fail(e).await,
            };

            let outcome = match self.executor.continuation(&context).await {
                Ok(outcome) => outcome,
                Err(e) => return self.fail(e).await,
            };

            let Some(artifact) = outcome.artifact else {
                return self
                    .fail(OrchestratorError::EmptyResponse {
                        last_processed_unit: context.last_processed_unit,
                    })
                    .await;
            };

            let committed = self
                .store
                .commit(&self.ticket, "continuation step", |state| {
                    let step = record_step(
                        state,
                        artifact,
                        outcome.last_processed_unit,
                        outcome.total_units,
                    );
                    self.emit_step(&step);
                    step
                })
                .await;
            let Some(step) = committed else {
                return Ok(LoopOutcome::Superseded);
            };

            if step.update.regressed {
                warn!(
                    generation = self.ticket.generation(),
                    reported = outcome.last_processed_unit,
                    kept = step.last_processed_unit,
                    "Service reported lastProcessedUnit going backwards, keeping committed value"
                );
            }
            debug!(
                generation = self.ticket.generation(),
                artifact_id = %step.artifact.id,
                is_new = step.is_new,
                last_processed_unit = step.last_processed_unit,
                total_units = step.total_units,
                "Continuation step committed"
            );

            if step.update.advanced {
                stalled_steps = 0;
            } else {
                stalled_steps += 1;
                if self.max_stalled_steps > 0 && stalled_steps >= self.max_stalled_steps {
                    return self
                        .fail(OrchestratorError::Stalled {
                            steps: stalled_steps,
                            last_processed_unit: step.last_processed_unit,
                        })
                        .await;
                }
            }
        }
    }

    /// Decides what happens next. A pause request is honoured before the
    /// completion check, so a pause that arrived during the final call still
    /// ends in `paused`. `None` means the ticket no longer owns the session.
    async fn checkpoint(&self) -> Result<Option<Checkpoint>> {
        let ticket = &self.ticket;
        self.store
            .commit(ticket, "checkpoint", |state| -> Result<Checkpoint> {
                let session_id = state.session.id();

                if state.session.status() != GenerationStatus::Generating {
                    return Err(OrchestratorError::NotRunning);
                }

                if state.session.cancel_requested()
                    || ticket.cancel_reason() == Some(CancelReason::Pause)
                {
                    state.session.pause()?;
                    let last_processed_unit = state.session.last_processed_unit();
                    self.emit(Event::GenerationPaused {
                        session_id,
                        last_processed_unit,
                    });
                    return Ok(Checkpoint::Paused {
                        session_id,
                        last_processed_unit,
                    });
                }

                if state.session.is_fully_processed() {
                    state.session.complete()?;
                    let artifact_count = state.ledger.len();
                    self.emit(Event::GenerationCompleted {
                        session_id,
                        artifact_count,
                    });
                    return Ok(Checkpoint::Completed {
                        session_id,
                        artifact_count,
                    });
                }

                let context = ContinuationContext::capture(&state.session, &state.ledger)?;
                Ok(Checkpoint::Continue(Box::new(context)))
            })
            .await
            .transpose()
    }

    /// Moves the session to `failed` and hands `error` back to the caller.
    ///
    /// A loop that lost its ticket reports `Superseded` instead; its error
    /// belongs to a session nobody is watching anymore.
    pub(crate) async fn fail(&self, error: OrchestratorError) -> Result<LoopOutcome> {
        let message = error.to_string();
        let committed = self
            .store
            .commit(&self.ticket, "fail", |state| {
                state.session.fail(message.clone())?;
                let session_id = state.session.id();
                self.emit(Event::GenerationFailed {
                    session_id,
                    error: message,
                });
                Ok::<_, templater_core::CoreError>(session_id)
            })
            .await;

        match committed {
            None => {
                debug!(
                    generation = self.ticket.generation(),
                    error = %error,
                    "Discarding error from superseded loop"
                );
                Ok(LoopOutcome::Superseded)
            }
            Some(Ok(session_id)) => {
                error!(
                    generation = self.ticket.generation(),
                    session_id = %session_id,
                    error = %error,
                    "Generation failed"
                );
                Err(error)
            }
            Some(Err(transition)) => {
                warn!(
                    generation = self.ticket.generation(),
                    error = %error,
                    transition_error = %transition,
                    "Could not mark session failed"
                );
                Err(error)
            }
        }
    }

    fn emit_step(&self, step: &CommittedStep) {
        self.emit(Event::ArtifactRecorded {
            session_id: step.session_id,
            artifact_id: step.artifact.id.to_string(),
            name: step.artifact.name.clone(),
            is_new: step.is_new,
        });
        self.emit(Event::GenerationProgress {
            session_id: step.session_id,
            last_processed_unit: step.last_processed_unit,
            total_units: step.total_units,
            progress_percent: step.progress_percent,
            message: step.message.clone(),
        });
    }

    fn emit(&self, event: Event) {
        if let Some(ref bus) = self.event_bus {
            bus.emit(event);
        }
    }
}

fn record_step(
    state: &mut GenerationState,
    artifact: Artifact,
    last_processed_unit: u64,
    total_units: Option<u64>,
) -> CommittedStep {
    let update = state
        .session
        .apply_progress(last_processed_unit, total_units);
    let is_new = state.ledger.record(artifact.clone());

    let session = &mut state.session;
    let message = format!(
        "Processed {} of {} units",
        session.last_processed_unit(),
        session.total_units()
    );
    session.set_status_message(message.clone());

    CommittedStep {
        session_id: session.id(),
        artifact,
        is_new,
        update,
        last_processed_unit: session.last_processed_unit(),
        total_units: session.total_units(),
        progress_percent: session.progress_percent(),
        message,
    }
}
