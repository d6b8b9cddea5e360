//! Session ownership and cooperative cancellation.
//!
//! Every `start`, `resume` and `reset` bumps a shared generation counter. A
//! loop holds the ticket it was started with; once the counter moves on the
//! ticket is stale and nothing that loop produces may be applied.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

pub type SharedGenerationId = Arc<AtomicU64>;

const NOT_CANCELLED: u8 = 0;
const CANCEL_PAUSE: u8 = 1;
const CANCEL_RESET: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Pause,
    Reset,
}

#[derive(Debug, Clone)]
pub struct SessionTicket {
    generation: u64,
    current: SharedGenerationId,
    cancel: Arc<AtomicU8>,
}

impl SessionTicket {
    /// Claims the next generation number and returns a ticket owning it.
    pub fn issue(current: &SharedGenerationId) -> Self {
        let generation = current.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            generation,
            current: Arc::clone(current),
            cancel: Arc::new(AtomicU8::new(NOT_CANCELLED)),
        }
    }

    /// Moves the counter on without handing out a ticket, orphaning whoever
    /// holds the current one.
    pub fn invalidate(current: &SharedGenerationId) -> u64 {
        current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// A reset request wins over a pause request.
    pub fn cancel(&self, reason: CancelReason) {
        let code = match reason {
            CancelReason::Pause => CANCEL_PAUSE,
            CancelReason::Reset => CANCEL_RESET,
        };
        self.cancel.fetch_max(code, Ordering::SeqCst);
    }

    /// `Reset` for a superseded ticket even if nobody cancelled it explicitly.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if !self.is_current() {
            return Some(CancelReason::Reset);
        }
        match self.cancel.load(Ordering::SeqCst) {
            CANCEL_PAUSE => Some(CancelReason::Pause),
            CANCEL_RESET => Some(CancelReason::Reset),
            _ => None,
        }
    }
}
