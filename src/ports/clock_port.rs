//! Pacing port for the bar feed.

use std::future::Future;
use std::time::Duration;

/// Source of delays between feed messages. Production code sleeps; tests
/// record the requested pauses and return at once.
pub trait Clock: Send + Sync {
    fn pause(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
