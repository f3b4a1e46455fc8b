//! A minimal cooperative cancellation token.
//!
//! The driver accepts a cancellation token that is propagated into fetch
//! and extension RPCs; cancellation aborts the run at the next suspension
//! point. Kept as a plain `Arc<AtomicBool>` rather than reaching for
//! `tokio-util`'s `CancellationToken`, which isn't otherwise part of the
//! crate's dependency set — this is the smallest thing that gives every
//! suspension point a cheap, clonable check.

use crate::core::StencilError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Call at every suspension point the driver crosses; turns a prior
    /// `cancel()` into a fatal error for the current run.
    pub fn check(&self) -> Result<(), StencilError> {
        if self.is_cancelled() {
            Err(StencilError::Other {
                message: "run cancelled".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_errors_after_cancel() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.check().is_err());
    }

    #[test]
    fn clone_shares_cancellation_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
