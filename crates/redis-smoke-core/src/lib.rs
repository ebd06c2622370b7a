//! # redis-smoke-core
//!
//! Core library for the Redis smoke tests providing:
//! - Retry sessions with pluggable backoff, conditions and fail handlers
//! - Subprocess attempts with bounded waits and captured output
//! - Configuration file parsing (JSON, located via `CONFIG_PATH`)

pub mod config;
pub mod error;
pub mod process;
pub mod retry;

pub use config::{LoadedConfig, SmokeTestConfig};
pub use error::{Error, Result};
pub use process::{CommandSpec, ProcessAttempt};
