//! Smoke test reporting
//!
//! Steps are registered per phase (suite setup, each plan, suite teardown)
//! before they run, so a report always lists what was skipped as well as
//! what ran. Failure messages are scanned for the `{"FailReason": "..."}`
//! envelope to produce a short summary at the end of the run.

use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;

/// Where operators are sent when a run fails
pub const TROUBLESHOOTING_URL: &str = "https://docs.vmware.com/en/Redis-for-VMware-Tanzu-Application-Service/3.4/redis-tanzu-application-service/GUID-smoke-tests.html";

static FAIL_REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{"FailReason":\s"(.*)"\}"#).expect("fail reason regex is valid")
});

/// Outcome of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    DidntRun,
    Failed,
    Passed,
    Skipped,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::DidntRun => write!(f, "DIDN'T RUN"),
            StepResult::Failed => write!(f, "FAILED"),
            StepResult::Passed => write!(f, "PASSED"),
            StepResult::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One reported step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub description: String,
    pub result: StepResult,
    pub duration: Duration,
}

impl Step {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            result: StepResult::DidntRun,
            duration: Duration::ZERO,
        }
    }
}

/// A step together with the task that performs it
pub struct PendingStep<'a> {
    step: Step,
    task: BoxFuture<'a, Result<()>>,
}

/// Describe a step whose task runs when the phase is performed
pub fn step<'a, F>(description: impl Into<String>, task: F) -> PendingStep<'a>
where
    F: Future<Output = Result<()>> + Send + 'a,
{
    PendingStep {
        step: Step::new(description),
        task: task.boxed(),
    }
}

/// Report sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeSuite,
    Spec,
    AfterSuite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure {
    title: String,
    message: String,
}

/// Collects steps and failures and prints the suite report
#[derive(Debug, Default)]
pub struct SmokeTestReport {
    test_count: usize,
    failures: Vec<Failure>,
    before_suite_steps: Vec<Step>,
    after_suite_steps: Vec<Step>,
    spec_steps: Vec<Step>,
}

impl SmokeTestReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn steps_mut(&mut self, phase: Phase) -> &mut Vec<Step> {
        match phase {
            Phase::BeforeSuite => &mut self.before_suite_steps,
            Phase::Spec => &mut self.spec_steps,
            Phase::AfterSuite => &mut self.after_suite_steps,
        }
    }

    pub fn steps(&self, phase: Phase) -> &[Step] {
        match phase {
            Phase::BeforeSuite => &self.before_suite_steps,
            Phase::Spec => &self.spec_steps,
            Phase::AfterSuite => &self.after_suite_steps,
        }
    }

    /// Add steps that will not be performed
    pub fn register(&mut self, phase: Phase, pending: Vec<PendingStep<'_>>) {
        self.steps_mut(phase)
            .extend(pending.into_iter().map(|p| p.step));
    }

    /// Register `pending` and perform the steps in order
    ///
    /// The first failing step stops the sequence; the steps after it stay
    /// `DIDN'T RUN`.
    pub async fn perform(&mut self, phase: Phase, pending: Vec<PendingStep<'_>>) -> Result<()> {
        let first = self.steps(phase).len();
        let mut tasks = Vec::with_capacity(pending.len());
        for PendingStep { step, task } in pending {
            self.steps_mut(phase).push(step);
            tasks.push(task);
        }

        for (offset, task) in tasks.into_iter().enumerate() {
            let step = &mut self.steps_mut(phase)[first + offset];
            step.result = StepResult::Failed;
            tracing::info!(step = %step.description, "performing step");

            let start = Instant::now();
            let outcome = task.await;
            step.duration = start.elapsed();

            match outcome {
                Ok(()) => step.result = StepResult::Passed,
                Err(e) => {
                    tracing::debug!(step = %step.description, error = %e, "step failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Overwrite the result of the most recently registered step
    pub fn mark_last(&mut self, phase: Phase, result: StepResult) {
        if let Some(step) = self.steps_mut(phase).last_mut() {
            step.result = result;
        }
    }

    /// Rename the most recently registered step
    pub fn rename_last(&mut self, phase: Phase, description: impl Into<String>) {
        if let Some(step) = self.steps_mut(phase).last_mut() {
            step.description = description.into();
        }
    }

    pub fn clear_spec_steps(&mut self) {
        self.spec_steps.clear();
    }

    /// Record a failure under `title`
    pub fn record_failure(&mut self, title: impl Into<String>, error: &anyhow::Error) {
        self.failures.push(Failure {
            title: title.into(),
            message: format!("{:#}", error),
        });
    }

    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Number of recorded failures, setup and teardown included
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn suite_will_begin(&self) {
        print!("{}", banner("Beginning test suite setup"));
    }

    pub fn before_suite_did_run(&mut self, error: Option<&anyhow::Error>) {
        if let Some(e) = error {
            self.record_failure("Suite setup", e);
        }
        print!("{}", banner("Finished test suite setup"));
        println!("Smoke Test Suite Setup Results:");
        print!("{}", render_steps(&self.before_suite_steps, false));
        println!();
    }

    pub fn spec_will_run(&mut self, title: &str) {
        self.test_count += 1;
        print!(
            "{}",
            banner(&format!("START {}. {}", self.test_count, title))
        );
    }

    pub fn spec_did_complete(&mut self, title: &str, error: Option<&anyhow::Error>) {
        if let Some(e) = error {
            self.record_failure(title, e);
        }
        print!("{}", banner(&format!("END {}. {}", self.test_count, title)));
        println!("Smoke Test plan Results:");
        print!("{}", render_steps(&self.spec_steps, true));
        println!();
    }

    pub fn after_suite_did_run(&mut self, error: Option<&anyhow::Error>) {
        if let Some(e) = error {
            self.record_failure("Suite teardown", e);
        }
        print!("{}", banner("Finished suite teardown"));
        println!("Smoke Test Suite Teardown Results:");
        print!("{}", render_steps(&self.after_suite_steps, false));
        println!();
    }

    pub fn suite_did_end(&self) {
        if !self.passed() {
            print!("{}", self.render_failure_summary());
        }
    }

    /// Failed titles with their extracted reasons, and where to get help
    pub fn render_failure_summary(&self) -> String {
        let mut out = banner("Summarising Failures");
        for failure in &self.failures {
            out.push_str(&format!("\n{}\n", failure.title));
            if let Some(reason) = extract_fail_reason(&failure.message) {
                out.push_str(&format!("> {}\n", reason));
            }
        }
        out.push_str(&format!(
            "\nFor help with troubleshooting, visit: {}\n\n",
            TROUBLESHOOTING_URL
        ));
        out
    }
}

/// The reason inside a `{"FailReason": "..."}` envelope, if present
pub fn extract_fail_reason(message: &str) -> Option<&str> {
    FAIL_REASON_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// A message framed by a border sized to fit it
pub fn banner(message: &str) -> String {
    let border = "-".repeat(message.chars().count() + 2);
    format!("\n\n|{}|\n| {} |\n|{}|\n\n", border, message, border)
}

/// `[i/n] description: RESULT` lines
pub fn render_steps(steps: &[Step], with_duration: bool) -> String {
    let count = steps.len();
    let mut out = String::new();
    for (i, step) in steps.iter().enumerate() {
        if with_duration {
            out.push_str(&format!(
                "[{}/{}] {}: {} Duration[{:?}] \n",
                i + 1,
                count,
                step.description,
                step.result,
                step.duration
            ));
        } else {
            out.push_str(&format!(
                "[{}/{}] {}: {}\n",
                i + 1,
                count,
                step.description,
                step.result
            ));
        }
    }
    out
}
