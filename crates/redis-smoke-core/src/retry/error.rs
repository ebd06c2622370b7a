//! Error types for retry sessions
//!
//! A session either returns the satisfying attempt or one of these errors.
//! Individual unsatisfied attempts are never surfaced.

use std::io;
use thiserror::Error;

/// Errors that end a retry session
#[derive(Debug, Error)]
pub enum RetryError {
    /// No attempt satisfied the condition
    ///
    /// The fail handler has already been invoked with `message` by the time
    /// this is returned.
    #[error("{message} (after {attempts} attempts)")]
    Exhausted {
        /// Total attempts made (`max_retries + 1`)
        attempts: u32,
        /// The caller-supplied or default failure message
        message: String,
    },

    /// The provider could not start an attempt
    ///
    /// Propagated immediately; the fail handler is not invoked.
    #[error("failed to start attempt {attempt}: {source}")]
    Spawn {
        /// Zero-indexed retry count of the attempt that could not start
        attempt: u32,
        /// The underlying launch error
        #[source]
        source: io::Error,
    },
}

impl RetryError {
    /// Create a new exhausted error
    pub fn exhausted(attempts: u32, message: impl Into<String>) -> Self {
        RetryError::Exhausted {
            attempts,
            message: message.into(),
        }
    }

    /// Create a new spawn error
    pub fn spawn(attempt: u32, source: io::Error) -> Self {
        RetryError::Spawn { attempt, source }
    }

    /// Number of attempts that were started
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Spawn { attempt, .. } => *attempt,
        }
    }

    /// Check if this error indicates all attempts were exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The failure message for exhausted sessions
    pub fn message(&self) -> Option<&str> {
        match self {
            RetryError::Exhausted { message, .. } => Some(message),
            RetryError::Spawn { .. } => None,
        }
    }
}
