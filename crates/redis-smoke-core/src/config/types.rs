//! Smoke test configuration types
//!
//! The on-disk format is JSON with snake_case keys. Everything except the
//! platform endpoint, credentials, service name and plans has a default.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::retry::{Backoff, RetrySettings, DEFAULT_MAX_RETRIES};

/// Default path of the sample application pushed by the suites
pub const DEFAULT_APP_PATH: &str = "assets/cf-redis-example-app";

/// Default prefix for generated org, space and quota names
pub const DEFAULT_NAME_PREFIX: &str = "redis-smoke";

/// Complete smoke test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeTestConfig {
    /// Cloud Controller API endpoint
    #[serde(default)]
    pub api: String,

    /// Domain the sample app is routed on
    #[serde(default)]
    pub apps_domain: String,

    /// Admin user name (used when no admin client is configured)
    #[serde(default)]
    pub admin_user: String,

    /// Admin user password
    #[serde(default)]
    pub admin_password: String,

    /// Admin UAA client id
    #[serde(default)]
    pub admin_client: String,

    /// Admin UAA client secret
    #[serde(default)]
    pub admin_client_secret: String,

    /// Pass `--skip-ssl-validation` to `cf api`
    #[serde(default)]
    pub skip_ssl_validation: bool,

    /// Reach the sample app over plain HTTP
    #[serde(default)]
    pub use_http_app: bool,

    /// Marketplace service offering name
    #[serde(default)]
    pub service_name: String,

    /// Plans to exercise, by name
    #[serde(default)]
    pub plan_names: Vec<String>,

    /// Plans to exercise, with per-plan options
    #[serde(default)]
    pub plans: Vec<PlanConfig>,

    /// Extra application security group rules bound for the test space
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupRule>,

    /// TLS versions the sample app should read through (e.g. `tlsv1.2`)
    #[serde(default)]
    pub tls_versions: Vec<String>,

    /// Whether the service only accepts TLS connections
    #[serde(default)]
    pub enforce_tls: bool,

    /// Path of the sample app to push
    #[serde(default = "default_app_path")]
    pub app_path: Utf8PathBuf,

    /// Prefix for generated org, space and quota names
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Retry policy for `cf` commands
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_app_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_APP_PATH)
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

/// A service plan under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Plan name as shown in the marketplace
    pub name: String,

    /// Whether the plan deploys sentinel-managed replicas
    #[serde(default)]
    pub ha_enabled: bool,
}

impl PlanConfig {
    /// A plan without HA
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ha_enabled: false,
        }
    }
}

/// One application security group rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// `tcp`, `udp`, `icmp` or `all`
    pub protocol: String,

    /// IP, range or CIDR
    pub destination: String,

    /// Port or port range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,

    /// Any other rule fields (`description`, `log`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SecurityGroupRule {
    /// A TCP rule for a single host and port
    pub fn tcp(destination: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: "tcp".to_string(),
            destination: destination.into(),
            ports: Some(port.to_string()),
            extra: BTreeMap::new(),
        }
    }
}

/// Backoff strategy names accepted in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackoffKind {
    /// Fixed interval after the first attempt
    #[default]
    None,
    /// Interval grows linearly
    Linear,
    /// Interval doubles
    Exponential,
}

impl FromStr for BackoffKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "fixed" => Ok(BackoffKind::None),
            "linear" => Ok(BackoffKind::Linear),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(Error::invalid_config(format!(
                "unknown backoff '{}', expected none, linear or exponential",
                other
            ))),
        }
    }
}

impl TryFrom<String> for BackoffKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackoffKind> for String {
    fn from(kind: BackoffKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffKind::None => write!(f, "none"),
            BackoffKind::Linear => write!(f, "linear"),
            BackoffKind::Exponential => write!(f, "exponential"),
        }
    }
}

/// Retry policy for `cf` commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff strategy
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Backoff baseline in milliseconds
    #[serde(default = "default_baseline_ms")]
    pub baseline_interval_milliseconds: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_baseline_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            baseline_interval_milliseconds: default_baseline_ms(),
        }
    }
}

impl RetryConfig {
    /// The configured backoff schedule
    pub fn backoff(&self) -> Backoff {
        let baseline = Duration::from_millis(self.baseline_interval_milliseconds);
        match self.backoff {
            BackoffKind::None => Backoff::None(baseline),
            BackoffKind::Linear => Backoff::Linear(baseline),
            BackoffKind::Exponential => Backoff::Exponential(baseline),
        }
    }

    /// Retries after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_attempts
    }

    /// Session settings using this policy and the given per-attempt timeout
    pub fn settings(&self, session_timeout: Duration) -> RetrySettings {
        RetrySettings {
            session_timeout,
            max_retries: self.max_retries(),
            backoff: self.backoff(),
        }
    }
}

/// Timeouts used by the suites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wait bound for ordinary `cf` commands and app requests
    #[serde(default = "default_short_seconds")]
    pub short_seconds: u64,

    /// Wait bound for `cf push` and `cf start`
    #[serde(default = "default_long_seconds")]
    pub long_seconds: u64,

    /// Interval between sample-app requests
    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: u64,
}

fn default_short_seconds() -> u64 {
    180
}

fn default_long_seconds() -> u64 {
    900
}

fn default_retry_interval_seconds() -> u64 {
    1
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            short_seconds: default_short_seconds(),
            long_seconds: default_long_seconds(),
            retry_interval_seconds: default_retry_interval_seconds(),
        }
    }
}

impl TimeoutConfig {
    /// Short timeout as a duration
    pub fn short(&self) -> Duration {
        Duration::from_secs(self.short_seconds)
    }

    /// Long timeout as a duration
    pub fn long(&self) -> Duration {
        Duration::from_secs(self.long_seconds)
    }

    /// Request interval as a duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }
}

/// How the suites authenticate as an administrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// `cf auth <client> <secret> --client-credentials`
    Client { id: String, secret: String },
    /// `cf auth <user> <password>`
    User { name: String, password: String },
}

impl LoginMethod {
    /// Step description for reports
    pub fn description(&self) -> &'static str {
        match self {
            LoginMethod::Client { .. } => "Log in as admin client",
            LoginMethod::User { .. } => "Log in as admin user",
        }
    }
}
