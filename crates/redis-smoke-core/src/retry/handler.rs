//! Fail handlers invoked when a retry session is exhausted

/// Callback invoked exactly once, with a human-readable message, when a
/// session runs out of attempts
///
/// Any `Fn(&str)` closure is a fail handler.
pub trait FailHandler: Send + Sync {
    /// Report the permanent failure
    fn fail(&self, message: &str);
}

impl<F> FailHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn fail(&self, message: &str) {
        self(message)
    }
}

/// Logs the failure at ERROR level and lets the session return its error
///
/// This is the default: the caller decides what exhaustion means.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailHandler;

impl FailHandler for LogFailHandler {
    fn fail(&self, message: &str) {
        tracing::error!(message = %message, "retry session failed");
    }
}

/// Panics with the failure message
///
/// Mirrors a test-framework failure: the surrounding test aborts at the
/// point of exhaustion.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicFailHandler;

impl FailHandler for PanicFailHandler {
    fn fail(&self, message: &str) {
        panic!("{}", message);
    }
}
