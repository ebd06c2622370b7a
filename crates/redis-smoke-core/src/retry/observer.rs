//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring attempts
//! and a `TracingObserver` implementation that logs using the `tracing` crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::attempt::AttemptOutcome;

/// Observer trait for retry session events
///
/// Attempt numbers passed to observers are zero-indexed retry counts, the
/// same values the backoff schedule receives.
pub trait RetryObserver: Send + Sync {
    /// Called after the backoff sleep, right before the provider is invoked
    fn on_attempt_start(&self, retry: u32, max_retries: u32);

    /// Called when an attempt finished without satisfying the condition
    fn on_attempt_unsatisfied(&self, retry: u32, outcome: &AttemptOutcome);

    /// Called when an attempt satisfied the condition
    fn on_satisfied(&self, retry: u32, total_duration: Duration);

    /// Called once when every attempt was unsatisfied
    fn on_exhausted(&self, attempts: u32, message: &str);
}

impl<O: RetryObserver + ?Sized> RetryObserver for Arc<O> {
    fn on_attempt_start(&self, retry: u32, max_retries: u32) {
        (**self).on_attempt_start(retry, max_retries)
    }

    fn on_attempt_unsatisfied(&self, retry: u32, outcome: &AttemptOutcome) {
        (**self).on_attempt_unsatisfied(retry, outcome)
    }

    fn on_satisfied(&self, retry: u32, total_duration: Duration) {
        (**self).on_satisfied(retry, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, message: &str) {
        (**self).on_exhausted(attempts, message)
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _retry: u32, _max_retries: u32) {}

    fn on_attempt_unsatisfied(&self, _retry: u32, _outcome: &AttemptOutcome) {}

    fn on_satisfied(&self, _retry: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _message: &str) {}
}

/// An observer that logs session events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: TRACE
/// - `on_attempt_unsatisfied`: DEBUG
/// - `on_satisfied`: INFO (after retries) or DEBUG (first attempt)
/// - `on_exhausted`: DEBUG (the fail handler reports the failure itself)
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `operation` - A descriptive name for the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, retry: u32, max_retries: u32) {
        tracing::trace!(
            operation = %self.operation,
            retry = retry,
            max_retries = max_retries,
            "starting attempt"
        );
    }

    fn on_attempt_unsatisfied(&self, retry: u32, outcome: &AttemptOutcome) {
        tracing::debug!(
            operation = %self.operation,
            retry = retry,
            outcome = %outcome.summary(),
            "attempt did not satisfy condition"
        );
    }

    fn on_satisfied(&self, retry: u32, total_duration: Duration) {
        if retry > 0 {
            tracing::info!(
                operation = %self.operation,
                retries = retry,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, message: &str) {
        tracing::debug!(
            operation = %self.operation,
            attempts = attempts,
            message = %message,
            "all attempts exhausted"
        );
    }
}

/// An observer that counts events, for tests and diagnostics
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    unsatisfied: AtomicU32,
    satisfied: AtomicU32,
    exhausted: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts started
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Number of attempts that did not satisfy the condition
    pub fn unsatisfied(&self) -> u32 {
        self.unsatisfied.load(Ordering::SeqCst)
    }

    /// Number of satisfied sessions
    pub fn satisfied(&self) -> u32 {
        self.satisfied.load(Ordering::SeqCst)
    }

    /// Number of exhausted sessions
    pub fn exhausted(&self) -> u32 {
        self.exhausted.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _retry: u32, _max_retries: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_unsatisfied(&self, _retry: u32, _outcome: &AttemptOutcome) {
        self.unsatisfied.fetch_add(1, Ordering::SeqCst);
    }

    fn on_satisfied(&self, _retry: u32, _total_duration: Duration) {
        self.satisfied.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _message: &str) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_observer_counts() {
        let observer = StatsObserver::new();

        observer.on_attempt_start(0, 3);
        observer.on_attempt_unsatisfied(0, &AttemptOutcome::exited(1, "", ""));
        observer.on_attempt_start(1, 3);
        observer.on_satisfied(1, Duration::from_millis(5));

        assert_eq!(observer.attempt_starts(), 2);
        assert_eq!(observer.unsatisfied(), 1);
        assert_eq!(observer.satisfied(), 1);
        assert_eq!(observer.exhausted(), 0);
    }

    #[test]
    fn test_arc_observer_forwards() {
        let observer = Arc::new(StatsObserver::new());
        let shared = observer.clone();

        shared.on_exhausted(4, "Exceeded 3 retries");

        assert_eq!(observer.exhausted(), 1);
    }
}
