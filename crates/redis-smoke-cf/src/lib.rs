//! Cloud Foundry helpers for the Redis smoke tests
//!
//! This crate drives the external tools the suites depend on:
//!
//! - **`cf`** - org/space setup, app lifecycle, service instances, bindings,
//!   service keys and security groups ([`CfCli`])
//! - **`curl`** - reads and writes through the Redis sample app ([`RedisApp`])
//!
//! It also decodes the sentinel status the sample app reports for HA plans
//! ([`ha`]).
//!
//! Every failure message follows the `{"FailReason": "..."}` convention
//! (see [`fail_reason`]) so a report can list the reasons without the
//! surrounding noise.

pub mod app;
pub mod cli;
pub mod credentials;
pub mod ha;

pub use app::RedisApp;
pub use cli::{BindingSource, CfCli, CreateServiceOutcome};
pub use credentials::{BindingEndpoint, Credentials};
pub use ha::{HaError, RedisMasterInfo, RedisReplicaInfo};

use regex::Regex;

/// Wrap `reason` in the `{"FailReason": "..."}` envelope
pub fn fail_reason(reason: &str) -> String {
    format!(r#"{{"FailReason": "{}"}}"#, reason.replace('"', "'"))
}

/// A pattern matching `text` literally
pub(crate) fn literal(text: &str) -> Result<Regex, regex::Error> {
    Regex::new(&regex::escape(text))
}
