//! Cooperative cancellation shared by every attempt of a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared flag flipped once on shutdown.
///
/// Attempts check it between rounds; collaborators may check it before
/// starting long external work. A round already in flight runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
