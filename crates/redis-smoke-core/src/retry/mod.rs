//! Retry sessions for flaky, asynchronous external commands
//!
//! A session is bound to a provider that starts one attempt (usually a
//! subprocess). It sleeps per a backoff schedule, starts an attempt, waits
//! a bounded time for it, and evaluates a condition; it stops at the first
//! satisfying attempt or after `max_retries + 1` attempts, in which case a
//! pluggable fail handler is invoked once.
//!
//! # Features
//!
//! - Backoff schedules: none/fixed, linear, exponential, or any closure
//! - Conditions: exit code zero, stdout match, stdout-or-stderr match, or
//!   any closure
//! - Fluent builder with `with_*`/`and_*` setters
//! - Observable attempts via the `RetryObserver` trait
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_smoke_core::process::CommandSpec;
//! use redis_smoke_core::retry::{self, matches_output, Backoff};
//! use regex::Regex;
//! use std::time::Duration;
//!
//! async fn example() -> Result<(), retry::RetryError> {
//!     let spec = CommandSpec::new("cf").args(["service", "my-redis"]);
//!
//!     retry::session(|| spec.spawn())
//!         .with_max_retries(10)
//!         .and_backoff(Backoff::Exponential(Duration::from_secs(1)))
//!         .until(
//!             matches_output(Regex::new("create succeeded").unwrap()),
//!             None,
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

mod attempt;
mod backoff;
mod condition;
mod error;
mod handler;
mod observer;
mod session;

pub use attempt::{Attempt, AttemptOutcome, AttemptProvider, CompletedAttempt};
pub use backoff::{Backoff, BackoffSchedule};
pub use condition::{
    matches_output, matches_std_or_error_output, succeeds, Condition, MatchesOutput,
    MatchesStdOrErrorOutput, Succeeds,
};
pub use error::RetryError;
pub use handler::{FailHandler, LogFailHandler, PanicFailHandler};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use session::{
    session, RetrySession, RetrySettings, Satisfied, SessionBuilder, DEFAULT_MAX_RETRIES,
    DEFAULT_SESSION_TIMEOUT,
};
