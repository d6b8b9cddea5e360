//! Control surface for generation sessions.
//!
//! One controller owns one session slot. `start`, `resume` and `reset` claim
//! a new generation number under the store's write lock, which is what lets
//! a reset cleanly orphan a loop whose remote call is still in flight.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use events::{Event, EventBus};
use templater_client::GenerationService;
use templater_core::{
    Artifact, EntityId, GenerationSession, GenerationSnapshot, GenerationStateMachine,
    GenerationStatus, ResumePoint, SessionInput,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::continuation::{ContinuationLoop, LoopOutcome};
use crate::error::{OrchestratorError, Result};
use crate::executor::StepExecutor;
use crate::store::{GenerationState, GenerationStore};
use crate::ticket::{CancelReason, SessionTicket, SharedGenerationId};

pub const DEFAULT_MAX_STALLED_STEPS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Consecutive continuation steps without progress before the session
    /// fails. 0 disables the guard.
    pub max_stalled_steps: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_stalled_steps: DEFAULT_MAX_STALLED_STEPS,
        }
    }
}

/// Handle to a launched session loop. Dropping it leaves the loop running.
#[derive(Debug)]
pub struct GenerationHandle {
    pub session_id: Uuid,
    pub generation: u64,
    join: JoinHandle<Result<LoopOutcome>>,
}

impl GenerationHandle {
    pub async fn wait(self) -> Result<LoopOutcome> {
        self.join
            .await
            .map_err(|e| OrchestratorError::TaskJoin(e.to_string()))?
    }
}

pub struct GenerationController {
    executor: StepExecutor,
    store: GenerationStore,
    generation_id: SharedGenerationId,
    event_bus: Option<EventBus>,
    config: ControllerConfig,
}

impl GenerationController {
    pub fn new(service: Arc<dyn GenerationService>, config: ControllerConfig) -> Self {
        Self {
            executor: StepExecutor::new(service),
            store: GenerationStore::new(),
            generation_id: Arc::new(AtomicU64::new(0)),
            event_bus: None,
            config,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Starts a fresh session and spawns its loop.
    ///
    /// The initial step runs inside the spawned task; its failure lands in
    /// the session as `failed` rather than in this call's result.
    pub async fn start(&self, input: SessionInput) -> Result<GenerationHandle> {
        input.validate()?;

        let (ticket, session_id) = {
            let mut state = self.store.write().await;
            if !GenerationStateMachine::can_start(&state.session.status()) {
                return Err(OrchestratorError::AlreadyRunning);
            }

            let ticket = SessionTicket::issue(&self.generation_id);
            state.session = GenerationSession::start(&state.session, ticket.generation(), input.clone())?;
            state.ledger.clear();
            state.ticket = Some(ticket.clone());
            let session_id = state.session.id();
            self.emit(Event::GenerationStarted {
                session_id,
                generation: ticket.generation(),
                resumed: false,
            });
            (ticket, session_id)
        };

        info!(
            generation = ticket.generation(),
            session_id = %session_id,
            domain_hint = %input.domain_hint,
            input_len = input.input_document.len(),
            "Starting generation"
        );

        let generation = ticket.generation();
        let executor = self.executor.clone();
        let continuation = self.continuation_loop(ticket);
        let join = tokio::spawn(async move {
            match executor.initial(&input).await {
                Ok(initial) => continuation.run(initial).await,
                Err(e) => continuation.fail(e).await,
            }
        });

        Ok(GenerationHandle {
            session_id,
            generation,
            join,
        })
    }

    /// Requests a pause. The session stays `generating` until the loop has
    /// committed whatever call is in flight.
    pub async fn pause(&self) -> Result<GenerationSnapshot> {
        let mut state = self.store.write().await;
        if state.session.status() != GenerationStatus::Generating {
            return Err(OrchestratorError::NotRunning);
        }

        state.session.request_cancel()?;
        if let Some(ticket) = &state.ticket {
            ticket.cancel(CancelReason::Pause);
        }
        info!(
            generation = state.session.generation(),
            session_id = %state.session.id(),
            last_processed_unit = state.session.last_processed_unit(),
            "Pause requested"
        );
        Ok(GenerationSnapshot::capture(&state.session, &state.ledger))
    }

    /// Continues the paused session as a new session, skipping the initial
    /// step.
    pub async fn resume(&self) -> Result<GenerationHandle> {
        let (ticket, session_id) = {
            let mut state = self.store.write().await;
            if state.session.status() != GenerationStatus::Paused {
                return Err(OrchestratorError::NotPaused);
            }
            let point = ResumePoint::capture(&state.session, &state.ledger)?;
            self.install_resumed(&mut state, &point)?
        };
        Ok(self.launch_resumed(ticket, session_id))
    }

    /// Starts a new session from an externally supplied resume point.
    pub async fn start_from(&self, point: ResumePoint) -> Result<GenerationHandle> {
        point.validate()?;

        let (ticket, session_id) = {
            let mut state = self.store.write().await;
            if !GenerationStateMachine::can_start(&state.session.status()) {
                return Err(OrchestratorError::AlreadyRunning);
            }
            self.install_resumed(&mut state, &point)?
        };
        Ok(self.launch_resumed(ticket, session_id))
    }

    /// Orphans any running loop and returns to an empty idle session.
    pub async fn reset(&self) -> GenerationSnapshot {
        let (snapshot, generation) = {
            let mut state = self.store.write().await;
            if let Some(ticket) = state.ticket.take() {
                ticket.cancel(CancelReason::Reset);
            }
            let previous = state.session.status();
            let generation = SessionTicket::invalidate(&self.generation_id);
            state.session.reset(generation);
            state.ledger.clear();

            debug!(
                generation = generation,
                previous_status = %previous,
                "Session reset"
            );
            self.emit(Event::GenerationReset { generation });
            (
                GenerationSnapshot::capture(&state.session, &state.ledger),
                generation,
            )
        };

        info!(generation = generation, "Generation reset to idle");
        snapshot
    }

    pub async fn snapshot(&self) -> GenerationSnapshot {
        self.store.snapshot().await
    }

    pub async fn status(&self) -> GenerationStatus {
        self.store.read().await.session.status()
    }

    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.store.read().await.ledger.items().to_vec()
    }

    pub async fn artifact(&self, id: &EntityId) -> Option<Artifact> {
        self.store.read().await.ledger.get(id).cloned()
    }

    /// Latest generation number handed out by start, resume or reset.
    pub fn current_generation(&self) -> u64 {
        self.generation_id.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn install_resumed(
        &self,
        state: &mut GenerationState,
        point: &ResumePoint,
    ) -> Result<(SessionTicket, Uuid)> {
        let ticket = SessionTicket::issue(&self.generation_id);
        state.session = GenerationSession::resume(&state.session, ticket.generation(), point)?;
        state.ledger = point.ledger();
        state.ticket = Some(ticket.clone());
        let session_id = state.session.id();
        self.emit(Event::GenerationStarted {
            session_id,
            generation: ticket.generation(),
            resumed: true,
        });
        Ok((ticket, session_id))
    }

    fn launch_resumed(&self, ticket: SessionTicket, session_id: Uuid) -> GenerationHandle {
        let generation = ticket.generation();
        info!(
            generation = generation,
            session_id = %session_id,
            "Resuming generation"
        );

        let continuation = self.continuation_loop(ticket);
        let join = tokio::spawn(continuation.resume());
        GenerationHandle {
            session_id,
            generation,
            join,
        }
    }

    fn continuation_loop(&self, ticket: SessionTicket) -> ContinuationLoop {
        ContinuationLoop::new(self.executor.clone(), self.store.clone(), ticket)
            .with_event_bus(self.event_bus.clone())
            .with_max_stalled_steps(self.config.max_stalled_steps)
    }

    fn emit(&self, event: Event) {
        if let Some(ref bus) = self.event_bus {
            bus.emit(event);
        }
    }
}

impl std::fmt::Debug for GenerationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationController")
            .field("generation", &self.current_generation())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
