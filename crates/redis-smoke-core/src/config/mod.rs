//! Smoke test configuration

mod loader;
mod types;

pub use loader::{LoadedConfig, CONFIG_PATH_ENV};
pub use types::{
    BackoffKind, LoginMethod, PlanConfig, RetryConfig, SecurityGroupRule, SmokeTestConfig,
    TimeoutConfig, DEFAULT_APP_PATH, DEFAULT_NAME_PREFIX,
};
