//! Client for the Redis sample application
//!
//! The sample app exposes `GET/PUT /<key>` against its bound Redis
//! instance, plus `/tls/<version>/<key>` for reads over a TLS connection.
//! All requests run through `curl` subprocesses inside retry sessions.

use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use redis_smoke_core::process::CommandSpec;
use redis_smoke_core::retry::{self, matches_output, Backoff, Condition, Succeeds};

use crate::{fail_reason, literal};

/// A pushed instance of the Redis sample app
#[derive(Debug, Clone)]
pub struct RedisApp {
    uri: String,
    timeout: Duration,
    retry_backoff: Backoff,
    curl: String,
}

impl RedisApp {
    /// `retry_interval` is the fixed pause between requests
    pub fn new(uri: impl Into<String>, timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            uri: uri.into().trim_end_matches('/').to_string(),
            timeout,
            retry_backoff: Backoff::None(retry_interval),
            curl: "curl".to_string(),
        }
    }

    /// Use a specific `curl` binary
    pub fn with_curl(mut self, curl: impl Into<String>) -> Self {
        self.curl = curl.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn key_uri(&self, key: &str) -> String {
        format!("{}/{}", self.uri, key)
    }

    /// `tlsv1.2` and `TLSv1.2` both map to `/tls/v1.2/<key>`
    pub fn key_tls_uri(&self, version: &str, key: &str) -> String {
        let version = version.to_ascii_lowercase().replace("tls", "");
        format!("{}/tls/{}/{}", self.uri, version, key)
    }

    fn curl(&self, skip_ssl: bool) -> CommandSpec {
        let spec = CommandSpec::new(&self.curl).arg("-s");
        if skip_ssl {
            spec.arg("-k")
        } else {
            spec
        }
    }

    async fn request<C: Condition>(
        &self,
        spec: CommandSpec,
        condition: C,
        reason: &str,
    ) -> Result<String> {
        let message = fail_reason(reason);

        let satisfied = retry::session(|| spec.spawn())
            .with_session_timeout(self.timeout)
            .and_backoff(self.retry_backoff)
            .with_operation("curl")
            .until(condition, Some(message.as_str()))
            .await?;

        Ok(satisfied.outcome.stdout)
    }

    /// Wait until the app answers its ping endpoint
    ///
    /// When TLS is enforced the ping goes through the first configured TLS
    /// version.
    pub async fn is_running(&self, enforced: bool, tls_versions: &[String]) -> Result<()> {
        let ping_uri = if enforced {
            let version = tls_versions.first().ok_or_else(|| {
                anyhow!(fail_reason(
                    "TLS is enforced but no TLS versions are configured"
                ))
            })?;
            format!("{}/", self.key_tls_uri(version, "ping"))
        } else {
            format!("{}/ping", self.uri)
        };

        info!(url = %ping_uri, "Checking that the app is responding");
        self.request(
            self.curl(true).arg(ping_uri),
            matches_output(literal("key not present")?),
            "Test app deployed but did not respond in time",
        )
        .await?;
        Ok(())
    }

    /// PUT `value` under `key`
    ///
    /// With `should_fail` the app must refuse the write, which is what
    /// happens when TLS is enforced and the plain port is closed.
    pub async fn write(&self, should_fail: bool, key: &str, value: &str) -> Result<()> {
        let uri = self.key_uri(key);
        info!(url = %uri, "Posting to url");

        let spec = self
            .curl(true)
            .args(["-d".to_string(), format!("data={}", value)])
            .args(["-X", "PUT"])
            .arg(uri.as_str());

        if should_fail {
            self.request(
                spec,
                matches_output(literal("fail")?),
                &format!("If enforced, it should not put {}", uri),
            )
            .await?;
        } else {
            self.request(
                spec,
                matches_output(literal("success")?),
                &format!("Failed to put to {}", uri),
            )
            .await?;
        }
        Ok(())
    }

    /// GET `key` and check the body contains `expected`
    pub async fn read_assert(&self, should_fail: bool, key: &str, expected: &str) -> Result<()> {
        let uri = self.key_uri(key);
        info!(url = %uri, "Getting from url");

        let pattern = if should_fail { "fail" } else { expected };
        self.request(
            self.curl(true).arg(uri.as_str()),
            matches_output(literal(pattern)?),
            &format!("Failed to get {}", uri),
        )
        .await?;
        Ok(())
    }

    /// GET `key` over a TLS connection to Redis, verifying the app's
    /// certificate
    pub async fn read_tls_assert(&self, tls_version: &str, key: &str, expected: &str) -> Result<()> {
        let uri = self.key_tls_uri(tls_version, key);
        info!(url = %uri, "Getting from url");

        self.request(
            self.curl(false).arg(uri.as_str()),
            matches_output(literal(expected)?),
            &format!("Failed to get expected value of '{}' from {}", expected, uri),
        )
        .await?;
        Ok(())
    }

    /// GET `key` and return the body
    pub async fn read(&self, key: &str) -> Result<String> {
        let uri = self.key_uri(key);
        info!(url = %uri, "Getting from url");

        self.request(
            self.curl(true).arg(uri.as_str()),
            Succeeds,
            &format!("Failed to get {}", uri),
        )
        .await
    }
}
