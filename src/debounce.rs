//! Trailing-edge debounce for canvas resize notifications.

use instant::Instant;
use std::time::Duration;

/// Keeps the latest value until no new value has arrived for `delay`.
///
/// The clock is passed in by the caller so the debouncer stays pure.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> ResizeDebouncer<T> {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record `value`, replacing anything still pending and restarting the delay
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the pending value once `delay` has elapsed since it was scheduled
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now.saturating_duration_since(*at) >= self.delay => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop whatever is pending
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
