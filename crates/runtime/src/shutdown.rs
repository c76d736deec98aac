//! Cooperative stop signal for the listen loop.
//!
//! The loop reads the signal once per iteration, before polling. Requesting a
//! stop never interrupts a poll or a running handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// The two states of a [`StopHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Running,
    Stopping,
}

/// Shared, cloneable stop signal.
///
/// Every clone observes the same state. Once stopping, a signal never goes
/// back to running.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopping: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Does not block.
    pub fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!("Stop requested, consumer will close on the next loop check");
        }
    }

    pub fn state(&self) -> SignalState {
        if self.is_stopping() {
            SignalState::Stopping
        } else {
            SignalState::Running
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}
