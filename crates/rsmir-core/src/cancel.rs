//! Cooperative cancellation of MIR builds.
//!
//! The builder polls its token after sealing each basic block and stops
//! with `Error::Interrupted` once the owning source has been cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side; hand out tokens with [`CancellationSource::token`].
#[derive(Debug, Default)]
pub struct CancellationSource {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: Some(self.cancelled.clone()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Observer side. The default token is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}
