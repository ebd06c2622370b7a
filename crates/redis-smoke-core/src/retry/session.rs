//! Retry session
//!
//! A session repeatedly starts an attempt, waits for it, and evaluates a
//! condition until the condition holds or the attempt budget runs out.

use std::time::{Duration, Instant};

use super::attempt::{Attempt, AttemptOutcome, AttemptProvider};
use super::backoff::{Backoff, BackoffSchedule};
use super::condition::Condition;
use super::error::RetryError;
use super::handler::{FailHandler, LogFailHandler};
use super::observer::{RetryObserver, TracingObserver};

/// Default per-attempt wait bound
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Plain settings shared by many sessions
///
/// Callers that run one session per command keep one of these around and
/// apply it with [`SessionBuilder::with_settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// How long to wait for each attempt to finish
    pub session_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Sleep schedule before each attempt
    pub backoff: Backoff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
        }
    }
}

/// Successful end of a session
#[derive(Debug, Clone)]
pub struct Satisfied {
    /// Attempts made, including the satisfying one
    pub attempts: u32,
    /// Outcome of the satisfying attempt
    pub outcome: AttemptOutcome,
}

/// Start configuring a session around `provider`
///
/// # Example
///
/// ```rust,no_run
/// use redis_smoke_core::process::CommandSpec;
/// use redis_smoke_core::retry::{self, Backoff, Succeeds};
/// use std::time::Duration;
///
/// async fn example() -> Result<(), retry::RetryError> {
///     let spec = CommandSpec::new("cf").args(["api", "api.example.com"]);
///
///     retry::session(|| spec.spawn())
///         .with_session_timeout(Duration::from_secs(180))
///         .and_max_retries(5)
///         .and_backoff(Backoff::Linear(Duration::from_millis(500)))
///         .until(Succeeds, Some("Failed to target Cloud Foundry"))
///         .await?;
///     Ok(())
/// }
/// ```
pub fn session<P: AttemptProvider>(provider: P) -> SessionBuilder<P> {
    SessionBuilder::new(provider)
}

/// Builder for a [`RetrySession`]
///
/// Defaults: 1 second session timeout, 10 retries, `Backoff::None(1s)`,
/// [`LogFailHandler`], and a [`TracingObserver`].
pub struct SessionBuilder<P> {
    provider: P,
    session_timeout: Duration,
    max_retries: u32,
    backoff: Box<dyn BackoffSchedule>,
    fail_handler: Box<dyn FailHandler>,
    observer: Box<dyn RetryObserver>,
}

impl<P: AttemptProvider> SessionBuilder<P> {
    /// Create a new builder with default settings
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Box::new(Backoff::default()),
            fail_handler: Box::new(LogFailHandler),
            observer: Box::new(TracingObserver::default()),
        }
    }

    /// Apply timeout, retry budget and backoff in one go
    ///
    /// Setters called afterwards override the matching field.
    pub fn with_settings(mut self, settings: &RetrySettings) -> Self {
        self.session_timeout = settings.session_timeout;
        self.max_retries = settings.max_retries;
        self.backoff = Box::new(settings.backoff);
        self
    }

    /// Set how long each attempt is waited on before it is evaluated
    ///
    /// This bounds the wait for one attempt; it is not the interval between
    /// attempts.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Alias of [`with_session_timeout`](Self::with_session_timeout)
    pub fn and_session_timeout(self, timeout: Duration) -> Self {
        self.with_session_timeout(timeout)
    }

    /// Set the number of retries; total attempts are `max + 1`
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Alias of [`with_max_retries`](Self::with_max_retries)
    pub fn and_max_retries(self, max: u32) -> Self {
        self.with_max_retries(max)
    }

    /// Set the backoff schedule
    pub fn with_backoff(mut self, backoff: impl BackoffSchedule + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Alias of [`with_backoff`](Self::with_backoff)
    pub fn and_backoff(self, backoff: impl BackoffSchedule + 'static) -> Self {
        self.with_backoff(backoff)
    }

    /// Set the handler invoked once when every attempt fails
    pub fn with_fail_handler(mut self, handler: impl FailHandler + 'static) -> Self {
        self.fail_handler = Box::new(handler);
        self
    }

    /// Alias of [`with_fail_handler`](Self::with_fail_handler)
    pub fn and_fail_handler(self, handler: impl FailHandler + 'static) -> Self {
        self.with_fail_handler(handler)
    }

    /// Set the observer
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Log through a [`TracingObserver`] named after `operation`
    pub fn with_operation(self, operation: impl Into<String>) -> Self {
        self.with_observer(TracingObserver::new(operation))
    }

    /// Build the session
    pub fn build(self) -> RetrySession<P> {
        RetrySession {
            provider: self.provider,
            session_timeout: self.session_timeout,
            max_retries: self.max_retries,
            backoff: self.backoff,
            fail_handler: self.fail_handler,
            observer: self.observer,
        }
    }

    /// Build the session and run it; see [`RetrySession::until`]
    pub async fn until<C: Condition>(
        self,
        condition: C,
        message: Option<&str>,
    ) -> Result<Satisfied, RetryError> {
        self.build().until(condition, message).await
    }
}

/// A configured retry session
///
/// Configuration is fixed once built. A session is consumed by
/// [`until`](Self::until); create a fresh one per logical operation.
pub struct RetrySession<P> {
    provider: P,
    session_timeout: Duration,
    max_retries: u32,
    backoff: Box<dyn BackoffSchedule>,
    fail_handler: Box<dyn FailHandler>,
    observer: Box<dyn RetryObserver>,
}

impl<P: AttemptProvider> RetrySession<P> {
    /// Per-attempt wait bound
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run attempts until `condition` holds
    ///
    /// For each retry count from 0 through `max_retries`: sleep for the
    /// backoff delay, start an attempt, wait up to the session timeout, and
    /// evaluate the condition. The first satisfying attempt ends the session.
    ///
    /// If no attempt is satisfied, the fail handler is called exactly once
    /// with `message` (or `Exceeded {max_retries} retries`) and the same
    /// message is returned in [`RetryError::Exhausted`].
    pub async fn until<C: Condition>(
        mut self,
        condition: C,
        message: Option<&str>,
    ) -> Result<Satisfied, RetryError> {
        let start = Instant::now();

        for retry in 0..=self.max_retries {
            let delay = self.backoff.delay(retry);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.observer.on_attempt_start(retry, self.max_retries);

            let mut attempt = self
                .provider
                .start()
                .map_err(|e| RetryError::spawn(retry, e))?;
            let outcome = attempt.wait(self.session_timeout).await;

            if condition.is_satisfied(&outcome) {
                self.observer.on_satisfied(retry, start.elapsed());
                return Ok(Satisfied {
                    attempts: retry + 1,
                    outcome,
                });
            }

            self.observer.on_attempt_unsatisfied(retry, &outcome);
        }

        let attempts = self.max_retries.saturating_add(1);
        let message = match message {
            Some(msg) => msg.to_string(),
            None => format!("Exceeded {} retries", self.max_retries),
        };

        self.observer.on_exhausted(attempts, &message);
        self.fail_handler.fail(&message);

        Err(RetryError::exhausted(attempts, message))
    }
}
