//! The out-of-band wake signal from producers to the event loop.
//!
//! Producers never touch display state; when they grow a buffer they raise
//! this flag and the event loop redraws on its next poll tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a redraw. Safe from any thread.
    pub fn wake(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Consume a pending wake, returning whether one was present.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}
