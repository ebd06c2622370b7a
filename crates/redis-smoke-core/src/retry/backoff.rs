//! Backoff schedules
//!
//! A backoff schedule maps a zero-indexed retry count to the time the retry
//! session sleeps before starting that attempt. Every built-in schedule
//! returns zero for retry count 0, so the first attempt is never delayed.

use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A schedule mapping a retry count to a wait duration
///
/// Implemented by [`Backoff`] and by any `Fn(u32) -> Duration` closure,
/// which makes it easy to observe how the session drives the schedule.
///
/// # Example
///
/// ```rust
/// use redis_smoke_core::retry::{Backoff, BackoffSchedule};
/// use std::time::Duration;
///
/// let backoff = Backoff::Exponential(Duration::from_millis(100));
/// assert_eq!(backoff.delay(0), Duration::ZERO);
/// assert_eq!(backoff.delay(3), Duration::from_millis(800));
/// ```
pub trait BackoffSchedule: Send + Sync {
    /// Duration to wait before the attempt with the given retry count
    fn delay(&self, retry: u32) -> Duration;
}

impl<F> BackoffSchedule for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, retry: u32) -> Duration {
        self(retry)
    }
}

/// Built-in backoff strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Zero for the first attempt, the given interval for every later one
    None(Duration),

    /// `retry * baseline`
    Linear(Duration),

    /// Zero for the first attempt, `2^retry * baseline` afterwards
    Exponential(Duration),
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::None(Duration::from_secs(1))
    }
}

impl BackoffSchedule for Backoff {
    fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None(interval) => {
                if retry == 0 {
                    Duration::ZERO
                } else {
                    interval
                }
            }

            Backoff::Linear(baseline) => baseline.saturating_mul(retry),

            Backoff::Exponential(baseline) => {
                if retry == 0 {
                    return Duration::ZERO;
                }
                1u128
                    .checked_shl(retry)
                    .and_then(|factor| factor.checked_mul(baseline.as_nanos()))
                    .and_then(duration_from_nanos)
                    .unwrap_or(Duration::MAX)
            }
        }
    }
}

/// `None` when `nanos` does not fit in a `Duration`
fn duration_from_nanos(nanos: u128) -> Option<Duration> {
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::None(d) => write!(f, "none ({}ms)", d.as_millis()),
            Backoff::Linear(d) => write!(f, "linear ({}ms)", d.as_millis()),
            Backoff::Exponential(d) => write!(f, "exponential ({}ms)", d.as_millis()),
        }
    }
}
