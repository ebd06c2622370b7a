//! Conditions deciding whether an attempt satisfied the caller
//!
//! Conditions are pure predicates over an [`AttemptOutcome`]. They must be
//! safe against empty or partial output: no match means `false`.

use regex::Regex;

use super::attempt::AttemptOutcome;

/// A predicate over a finished attempt
pub trait Condition: Send + Sync {
    /// Whether the outcome satisfies this condition
    fn is_satisfied(&self, outcome: &AttemptOutcome) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&AttemptOutcome) -> bool + Send + Sync,
{
    fn is_satisfied(&self, outcome: &AttemptOutcome) -> bool {
        self(outcome)
    }
}

/// Satisfied iff the process exited with code 0
#[derive(Debug, Clone, Copy, Default)]
pub struct Succeeds;

impl Condition for Succeeds {
    fn is_satisfied(&self, outcome: &AttemptOutcome) -> bool {
        outcome.succeeded()
    }
}

/// Satisfied iff the pattern matches anywhere in standard output
///
/// The exit code is ignored.
#[derive(Debug, Clone)]
pub struct MatchesOutput(pub Regex);

impl Condition for MatchesOutput {
    fn is_satisfied(&self, outcome: &AttemptOutcome) -> bool {
        self.0.is_match(&outcome.stdout)
    }
}

/// Satisfied iff the pattern matches standard output or standard error
#[derive(Debug, Clone)]
pub struct MatchesStdOrErrorOutput(pub Regex);

impl Condition for MatchesStdOrErrorOutput {
    fn is_satisfied(&self, outcome: &AttemptOutcome) -> bool {
        self.0.is_match(&outcome.stdout) || self.0.is_match(&outcome.stderr)
    }
}

/// Shorthand for [`Succeeds`]
pub fn succeeds() -> Succeeds {
    Succeeds
}

/// Shorthand for [`MatchesOutput`]
pub fn matches_output(pattern: Regex) -> MatchesOutput {
    MatchesOutput(pattern)
}

/// Shorthand for [`MatchesStdOrErrorOutput`]
pub fn matches_std_or_error_output(pattern: Regex) -> MatchesStdOrErrorOutput {
    MatchesStdOrErrorOutput(pattern)
}
