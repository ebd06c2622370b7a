//! Attempt seam between the retry session and whatever it is retrying
//!
//! A provider starts one attempt (usually a subprocess); the session waits
//! on it for a bounded time and evaluates the resulting [`AttemptOutcome`].

use async_trait::async_trait;
use std::io;
use std::time::Duration;

/// Observed result of one attempt
///
/// Outcomes are ephemeral: the session hands each one to the condition and
/// only keeps the one that satisfied it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Exit code, or `None` if the process had not exited within the wait
    /// bound (or was terminated by a signal)
    pub exit_code: Option<i32>,

    /// Captured standard output (possibly partial)
    pub stdout: String,

    /// Captured standard error (possibly partial)
    pub stderr: String,

    /// Whether the wait bound elapsed before the process exited
    pub timed_out: bool,
}

impl AttemptOutcome {
    /// Outcome of a process that exited with the given code and output
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Outcome of a process that was still running when the wait bound elapsed
    pub fn timed_out(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: true,
        }
    }

    /// True if the process exited with code 0
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        match (self.timed_out, self.exit_code) {
            (true, _) => "timed out".to_string(),
            (false, Some(code)) => format!("exit code {}", code),
            (false, None) => "terminated by signal".to_string(),
        }
    }
}

/// A started attempt that can be waited on
#[async_trait]
pub trait Attempt: Send {
    /// Wait up to `timeout` for the attempt to finish and report its outcome
    ///
    /// This must never fail: an attempt that cannot be observed is simply
    /// an unsatisfying outcome.
    async fn wait(&mut self, timeout: Duration) -> AttemptOutcome;
}

/// Starts one attempt per call
///
/// Any `FnMut() -> io::Result<A>` closure is a provider. A provider error
/// means the attempt could not even be launched (for example a missing
/// binary); the session propagates it instead of retrying.
pub trait AttemptProvider: Send {
    /// The attempt handle produced by this provider
    type Attempt: Attempt;

    /// Start a new attempt
    fn start(&mut self) -> io::Result<Self::Attempt>;
}

impl<F, A> AttemptProvider for F
where
    F: FnMut() -> io::Result<A> + Send,
    A: Attempt,
{
    type Attempt = A;

    fn start(&mut self) -> io::Result<A> {
        self()
    }
}

/// An attempt whose outcome is already known
///
/// Useful for hosts that evaluate something in-process, and for tests.
#[derive(Debug, Clone)]
pub struct CompletedAttempt(pub AttemptOutcome);

#[async_trait]
impl Attempt for CompletedAttempt {
    async fn wait(&mut self, _timeout: Duration) -> AttemptOutcome {
        self.0.clone()
    }
}
