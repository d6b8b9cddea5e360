//! Shared session state guarded by the generation ticket.

use std::sync::Arc;

use templater_core::{ArtifactLedger, GenerationSession, GenerationSnapshot};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::ticket::SessionTicket;

#[derive(Debug, Default)]
pub struct GenerationState {
    pub session: GenerationSession,
    pub ledger: ArtifactLedger,
    /// Ticket of the loop that owns `session`, if one was ever launched.
    pub ticket: Option<SessionTicket>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationStore {
    inner: Arc<RwLock<GenerationState>>,
}

impl GenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GenerationState> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GenerationState> {
        self.inner.write().await
    }

    /// Applies `update` only if `ticket` still owns the session.
    ///
    /// The ownership check happens under the write lock, so a reset that
    /// lands first always wins. Returns `None` when the write was blocked.
    pub async fn commit<R>(
        &self,
        ticket: &SessionTicket,
        action: &'static str,
        update: impl FnOnce(&mut GenerationState) -> R,
    ) -> Option<R> {
        let mut state = self.inner.write().await;
        if !ticket.is_current() {
            warn!(
                my_id = ticket.generation(),
                active_id = state.session.generation(),
                action = action,
                "BLOCKED state update - generation cancelled or stale"
            );
            return None;
        }
        Some(update(&mut state))
    }

    pub async fn snapshot(&self) -> GenerationSnapshot {
        let state = self.inner.read().await;
        GenerationSnapshot::capture(&state.session, &state.ledger)
    }
}
