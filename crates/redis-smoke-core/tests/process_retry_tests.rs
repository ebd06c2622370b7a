//! Retry sessions driving real subprocesses

#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use redis_smoke_core::retry::{
    matches_output, matches_std_or_error_output, session, Attempt, Backoff, RetryError,
    Succeeds,
};
use regex::Regex;
use tempfile::TempDir;

#[tokio::test]
async fn test_flaky_command_eventually_succeeds() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("runs");
    let spec = common::sh(&common::flaky_script(&counter, 2));

    let satisfied = session(|| spec.spawn())
        .with_max_retries(5)
        .and_backoff(Backoff::None(Duration::from_millis(10)))
        .and_session_timeout(Duration::from_secs(10))
        .until(Succeeds, None)
        .await
        .unwrap();

    assert_eq!(satisfied.attempts, 3);
    assert_eq!(common::runs(&counter), 3);
    assert!(satisfied.outcome.stdout.contains("create succeeded"));
}

#[tokio::test]
async fn test_exhausted_session_reports_message() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("runs");
    let spec = common::sh(&common::flaky_script(&counter, 100));
    let message = r#"{"FailReason": "Failed to create Redis service instance"}"#;

    let err = session(|| spec.spawn())
        .with_max_retries(2)
        .and_backoff(Backoff::None(Duration::from_millis(10)))
        .and_fail_handler(|_: &str| {})
        .until(Succeeds, Some(message))
        .await
        .unwrap_err();

    assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
    assert_eq!(err.message(), Some(message));
    assert_eq!(common::runs(&counter), 3);
}

#[tokio::test]
async fn test_hanging_command_is_retried_after_timeout() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("runs");
    let path = counter.display();
    let spec = common::sh(&format!(
        "n=$(cat {path} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {path}; \
         if [ $n -eq 1 ]; then sleep 30; fi; echo done"
    ));

    let satisfied = session(|| spec.spawn())
        .with_max_retries(2)
        .and_backoff(Backoff::None(Duration::ZERO))
        .and_session_timeout(Duration::from_millis(500))
        .until(Succeeds, None)
        .await
        .unwrap();

    assert_eq!(satisfied.attempts, 2);
}

#[tokio::test]
async fn test_output_condition_on_stderr() {
    let spec = common::sh("echo 'Service instance my-redis not found' >&2; exit 1");

    let err = session(|| spec.spawn())
        .with_max_retries(0)
        .and_fail_handler(|_: &str| {})
        .until(matches_output(Regex::new("not found").unwrap()), None)
        .await;
    assert!(err.is_err());

    let ok = session(|| spec.spawn())
        .with_max_retries(0)
        .until(
            matches_std_or_error_output(Regex::new("Service instance .* not found").unwrap()),
            None,
        )
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn test_missing_program_is_a_spawn_error() {
    let spec = redis_smoke_core::CommandSpec::new("cf-binary-that-is-not-installed");

    let err = session(|| spec.spawn())
        .with_max_retries(3)
        .until(Succeeds, None)
        .await
        .unwrap_err();

    assert!(matches!(err, RetryError::Spawn { attempt: 0, .. }));
}

#[tokio::test]
async fn test_exit_is_not_held_up_by_inherited_pipe() {
    // the background sleep keeps stdout open after sh exits
    let mut attempt = common::sh("sleep 5 & echo done").spawn().unwrap();

    let start = Instant::now();
    let outcome = attempt.wait(Duration::from_secs(4)).await;

    assert!(start.elapsed() < Duration::from_secs(3), "{:?}", start.elapsed());
    assert_eq!(outcome.exit_code, Some(0));
    assert!(!outcome.timed_out);
    assert_eq!(outcome.stdout, "done\n");
}
