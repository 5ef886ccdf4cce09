//! Clock implementations for feed pacing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ports::clock_port::Clock;

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and remembers every requested pause. Clones share the
/// same record.
#[derive(Debug, Clone, Default)]
pub struct InstantClock {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        match self.pauses.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Clock for InstantClock {
    async fn pause(&self, duration: Duration) {
        match self.pauses.lock() {
            Ok(mut guard) => guard.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}
