use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::MatchError;

/// Cooperative cancellation shared between a caller and an in-flight call.
/// The caller triggers it from a timeout watchdog; the pipeline checks it
/// between states and inside long search loops and aborts with
/// [`MatchError::Cancelled`] without corrupting any shared state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn checked(&self) -> Result<(), MatchError> {
        if self.is_cancelled() {
            Err(MatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
