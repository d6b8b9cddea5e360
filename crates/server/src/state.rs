use std::sync::{Arc, RwLock};

use events::EventBus;
use orchestrator::GenerationController;
use templater_client::{ClientError, GenerationClient, GenerationService};
use tokio::sync::broadcast::error::RecvError;

use crate::config::AppConfig;
use crate::routes::sse::{EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<GenerationController>,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the HTTP generation client from `config` and wires it into a
    /// controller. Must be called from within a Tokio runtime.
    pub fn new(config: AppConfig) -> Result<Self, ClientError> {
        let client = GenerationClient::from_config(&config.generation_service.client_config())?;
        Ok(Self::with_service(Arc::new(client), config))
    }

    pub fn with_service(service: Arc<dyn GenerationService>, config: AppConfig) -> Self {
        let event_bus = EventBus::with_capacity(config.orchestrator.event_capacity);
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));
        let controller = GenerationController::new(service, config.orchestrator.controller_config())
            .with_event_bus(event_bus.clone());

        spawn_event_recorder(&event_bus, Arc::clone(&event_buffer));

        Self {
            controller: Arc::new(controller),
            event_bus,
            event_buffer,
            config: Arc::new(config),
        }
    }
}

/// Keeps the replay buffer filled whether or not an SSE client is connected.
fn spawn_event_recorder(event_bus: &EventBus, buffer: SharedEventBuffer) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => buffer
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Event recorder lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
