//! Cloud Foundry CLI wrapper
//!
//! Every operation builds a `cf` argument vector and runs it in its own
//! retry session. Failures carry a `{"FailReason": "..."}` message so the
//! suite reporter can summarise them.
//!
//! # Isolation
//!
//! When a `cf_home` directory is configured it is passed to each child as
//! `CF_HOME`, so concurrent runners never share CLI state and the parent
//! process environment is left untouched.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::{debug, info, warn};

use redis_smoke_core::config::{LoginMethod, SecurityGroupRule, SmokeTestConfig};
use redis_smoke_core::process::CommandSpec;
use redis_smoke_core::retry::{
    self, matches_output, matches_std_or_error_output, AttemptOutcome, Backoff, Condition,
    RetrySettings, Succeeds,
};

use crate::credentials::{
    parse_binding_credentials, parse_service_key, BindingEndpoint, Credentials,
};
use crate::{fail_reason, literal};

/// Backoff used while waiting on asynchronous broker operations
const ASYNC_POLL_BACKOFF: Backoff = Backoff::Exponential(Duration::from_secs(1));

/// Retries used while waiting on asynchronous broker operations
const ASYNC_POLL_RETRIES: u32 = 10;

/// Broker messages meaning no more instances of a plan can be created
const QUOTA_REACHED_PATTERNS: &[&str] = &[
    // legacy release
    "instance limit for this service has been reached",
    // on-demand broker
    "The quota for this service plan has been exceeded.",
];

/// Result of `cf create-service`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateServiceOutcome {
    /// The instance exists and creation has completed
    Created,
    /// The broker refused because the plan quota is exhausted
    QuotaReached,
}

impl CreateServiceOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CreateServiceOutcome::QuotaReached)
    }
}

/// Where the Redis host and port for a security group come from
#[derive(Debug, Clone, Copy)]
pub enum BindingSource<'a> {
    /// The single service binding of an app
    App(&'a str),
    /// A service key read earlier
    ServiceKey(&'a Credentials),
}

/// Testing wrapper around the `cf` CLI
#[derive(Debug, Clone)]
pub struct CfCli {
    binary: String,
    cf_home: Option<Utf8PathBuf>,
    /// Policy for ordinary commands; its timeout is the short one
    retry: RetrySettings,
    long_timeout: Duration,
}

impl CfCli {
    /// Create a wrapper around `cf` on the PATH
    pub fn new(
        short_timeout: Duration,
        long_timeout: Duration,
        max_retries: u32,
        retry_backoff: Backoff,
    ) -> Self {
        let retry = RetrySettings {
            session_timeout: short_timeout,
            max_retries,
            backoff: retry_backoff,
        };
        Self::from_settings(retry, long_timeout)
    }

    /// Create a wrapper from a retry policy and the wait bound used for
    /// `cf push` and `cf start`
    pub fn from_settings(retry: RetrySettings, long_timeout: Duration) -> Self {
        Self {
            binary: "cf".to_string(),
            cf_home: None,
            retry,
            long_timeout,
        }
    }

    /// Create a wrapper using the timeouts and retry policy of `config`
    pub fn from_config(config: &SmokeTestConfig) -> Self {
        Self::from_settings(
            config.retry.settings(config.timeouts.short()),
            config.timeouts.long(),
        )
    }

    /// Use a specific `cf` binary
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run every command with `CF_HOME` set to `dir`
    pub fn with_cf_home(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cf_home = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn cf_home(&self) -> Option<&Utf8Path> {
        self.cf_home.as_deref()
    }

    pub fn short_timeout(&self) -> Duration {
        self.retry.session_timeout
    }

    pub fn long_timeout(&self) -> Duration {
        self.long_timeout
    }

    /// Whether the configured binary can be found
    pub fn check_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(&self.binary).args(args);
        match &self.cf_home {
            Some(home) => spec.env("CF_HOME", home.as_str()),
            None => spec,
        }
    }

    /// Run until the command exits zero
    async fn run(&self, spec: CommandSpec, reason: &str) -> Result<AttemptOutcome> {
        self.run_until(spec, self.short_timeout(), Succeeds, reason)
            .await
    }

    async fn run_until<C: Condition>(
        &self,
        spec: CommandSpec,
        timeout: Duration,
        condition: C,
        reason: &str,
    ) -> Result<AttemptOutcome> {
        let settings = RetrySettings {
            session_timeout: timeout,
            ..self.retry
        };
        self.session_until(spec, &settings, condition, reason).await
    }

    /// Run with the slower schedule used for asynchronous broker operations
    async fn poll_until<C: Condition>(
        &self,
        spec: CommandSpec,
        condition: C,
        reason: &str,
    ) -> Result<AttemptOutcome> {
        let settings = RetrySettings {
            session_timeout: self.short_timeout(),
            max_retries: ASYNC_POLL_RETRIES,
            backoff: ASYNC_POLL_BACKOFF,
        };
        self.session_until(spec, &settings, condition, reason).await
    }

    async fn session_until<C: Condition>(
        &self,
        spec: CommandSpec,
        settings: &RetrySettings,
        condition: C,
        reason: &str,
    ) -> Result<AttemptOutcome> {
        let operation = match spec.get_args().first() {
            Some(sub) => format!("cf {}", sub),
            None => "cf".to_string(),
        };
        let message = fail_reason(reason);

        let satisfied = retry::session(|| spec.spawn())
            .with_settings(settings)
            .with_operation(operation)
            .until(condition, Some(message.as_str()))
            .await?;

        Ok(satisfied.outcome)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// `cf api <endpoint> [--skip-ssl-validation]`
    pub async fn api(&self, endpoint: &str, skip_ssl_validation: bool) -> Result<()> {
        let mut spec = self.command(["api", endpoint]);
        if skip_ssl_validation {
            spec = spec.arg("--skip-ssl-validation");
        }
        self.run(spec, "Failed to target Cloud Foundry").await?;
        Ok(())
    }

    /// `cf auth <user> <password>`
    pub async fn auth(&self, user: &str, password: &str) -> Result<()> {
        let spec = self.command(["auth", user]).secret_arg(password);
        self.run(spec, "Failed to `cf auth` with target Cloud Foundry")
            .await?;
        Ok(())
    }

    /// `cf auth <client> <secret> --client-credentials`
    pub async fn auth_client(&self, client: &str, secret: &str) -> Result<()> {
        let spec = self
            .command(["auth", client])
            .secret_arg(secret)
            .arg("--client-credentials");
        self.run(
            spec,
            "Failed to `cf auth` with target Cloud Foundry using client credentials",
        )
        .await?;
        Ok(())
    }

    /// Authenticate with whichever admin login is configured
    pub async fn login(&self, method: &LoginMethod) -> Result<()> {
        match method {
            LoginMethod::Client { id, secret } => self.auth_client(id, secret).await,
            LoginMethod::User { name, password } => self.auth(name, password).await,
        }
    }

    /// `cf logout`
    pub async fn logout(&self) -> Result<()> {
        self.run(self.command(["logout"]), "Failed to logout")
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Orgs, spaces and quotas
    // ------------------------------------------------------------------

    /// `cf create-quota <name> [args...]`
    pub async fn create_quota(&self, name: &str, args: &[&str]) -> Result<()> {
        let spec = self
            .command(["create-quota", name])
            .args(args.iter().copied());
        self.run(spec, "Failed to `cf create-quota` with target Cloud Foundry")
            .await?;
        Ok(())
    }

    /// `cf create-org <org> -q <quota>`
    pub async fn create_org(&self, org: &str, quota: &str) -> Result<()> {
        self.run(
            self.command(["create-org", org, "-q", quota]),
            "Failed to create CF test org",
        )
        .await?;
        Ok(())
    }

    /// `cf delete-org -f <org>`
    pub async fn delete_org(&self, org: &str) -> Result<()> {
        self.run(
            self.command(["delete-org", "-f", org]),
            "Failed to delete CF test org",
        )
        .await?;
        Ok(())
    }

    /// `cf create-space <space>`
    pub async fn create_space(&self, space: &str) -> Result<()> {
        self.run(
            self.command(["create-space", space]),
            "Failed to create CF test space",
        )
        .await?;
        Ok(())
    }

    /// `cf target -o <org>`
    pub async fn target_org(&self, org: &str) -> Result<()> {
        self.run(
            self.command(["target", "-o", org]),
            "Failed to target test org",
        )
        .await?;
        Ok(())
    }

    /// `cf target -o <org> -s <space>`
    pub async fn target_org_and_space(&self, org: &str, space: &str) -> Result<()> {
        self.run(
            self.command(["target", "-o", org, "-s", space]),
            "Failed to target test org",
        )
        .await?;
        Ok(())
    }

    /// `cf enable-service-access -o <org> <service>`
    ///
    /// Access is disabled first so the command is idempotent.
    pub async fn enable_service_access(&self, org: &str, service: &str) -> Result<()> {
        self.run(
            self.command(["disable-service-access", "-o", org, service]),
            "Failed to disable service access for CF test org",
        )
        .await?;
        self.run(
            self.command(["enable-service-access", "-o", org, service]),
            "Failed to enable service access for CF test org",
        )
        .await?;
        Ok(())
    }

    /// `cf enable-service-access -o <org> -p <plan> <service>`
    ///
    /// Access is disabled first so the command is idempotent.
    pub async fn enable_service_access_for_plan(
        &self,
        org: &str,
        service: &str,
        plan: &str,
    ) -> Result<()> {
        self.run(
            self.command(["disable-service-access", "-o", org, "-p", plan, service]),
            "Failed to disable service plan access for CF test org",
        )
        .await?;
        self.run(
            self.command(["enable-service-access", "-o", org, "-p", plan, service]),
            "Failed to enable service plan access for CF test org",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// `cf create-user <name> <password>`; an existing user is not an error
    pub async fn create_user(&self, name: &str, password: &str) -> Result<()> {
        let spec = self.command(["create-user", name]).secret_arg(password);
        self.run(spec, "Failed to create user").await?;
        Ok(())
    }

    /// `cf delete-user -f <name>`
    pub async fn delete_user(&self, name: &str) -> Result<()> {
        self.run(
            self.command(["delete-user", "-f", name]),
            "Failed to delete user",
        )
        .await?;
        Ok(())
    }

    /// `cf set-space-role <name> <org> <space> <role>`
    pub async fn set_space_role(&self, name: &str, org: &str, space: &str, role: &str) -> Result<()> {
        self.run(
            self.command(["set-space-role", name, org, space, role]),
            "Failed to set space role",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Security groups
    // ------------------------------------------------------------------

    /// Create a security group opening the Redis endpoint and bind it to
    /// `org`/`space`
    ///
    /// `extra_rules` are appended after the rule derived from `source`.
    pub async fn create_and_bind_security_group(
        &self,
        group: &str,
        source: BindingSource<'_>,
        org: &str,
        space: &str,
        extra_rules: &[SecurityGroupRule],
    ) -> Result<()> {
        let primary = match source {
            BindingSource::App(app) => {
                let guid = self.app_guid(app).await?;
                self.binding_credentials(&guid).await?.security_group_rule()
            }
            BindingSource::ServiceKey(credentials) => credentials.security_group_rule(),
        };

        let mut rules = Vec::with_capacity(extra_rules.len() + 1);
        rules.push(primary);
        rules.extend_from_slice(extra_rules);

        let mut file = tempfile::Builder::new()
            .prefix("smoke-test-security-group-")
            .suffix(".json")
            .tempfile()
            .with_context(|| fail_reason("Failed to create security group file"))?;
        serde_json::to_writer(&mut file, &rules)
            .with_context(|| fail_reason("Failed to encode security groups"))?;
        file.flush()
            .with_context(|| fail_reason("Failed to encode security groups"))?;

        let path = file.path().to_string_lossy().into_owned();
        debug!(group, rules = rules.len(), "creating security group");

        self.run(
            self.command(["create-security-group", group, path.as_str()]),
            "Failed to create security group",
        )
        .await?;
        self.run(
            self.command(["bind-security-group", group, org, space]),
            "Failed to bind security group to space",
        )
        .await?;
        Ok(())
    }

    /// `cf delete-security-group <group> -f`
    pub async fn delete_security_group(&self, group: &str) -> Result<()> {
        self.run(
            self.command(["delete-security-group", group, "-f"]),
            "Failed to delete security group",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// `cf push <app> [args...]`
    pub async fn push(&self, app: &str, args: &[&str]) -> Result<()> {
        let spec = self.command(["push", app]).args(args.iter().copied());
        self.run_until(
            spec,
            self.long_timeout,
            Succeeds,
            "Failed to `cf push` test app",
        )
        .await?;
        Ok(())
    }

    /// `cf start <app>`
    pub async fn start(&self, app: &str) -> Result<()> {
        self.run_until(
            self.command(["start", app]),
            self.long_timeout,
            Succeeds,
            "Failed to start test app",
        )
        .await?;
        Ok(())
    }

    /// `cf delete <app> -f -r`
    pub async fn delete_app(&self, app: &str) -> Result<()> {
        self.run(
            self.command(["delete", app, "-f", "-r"]),
            "Failed to `cf delete` test app",
        )
        .await?;
        Ok(())
    }

    /// `cf set-env <app> <name> <value>`
    pub async fn set_env(&self, app: &str, name: &str, value: &str) -> Result<()> {
        self.run(
            self.command(["set-env", app, name, value]),
            "Failed to set environment variable for test app",
        )
        .await?;
        Ok(())
    }

    /// `cf app --guid <app>`
    pub async fn app_guid(&self, app: &str) -> Result<String> {
        let outcome = self
            .run(
                self.command(["app", "--guid", app]),
                "Failed to retrieve GUID for app",
            )
            .await?;
        Ok(outcome.stdout.trim().to_string())
    }

    /// Host and port of the single service binding of the app with `guid`
    pub async fn binding_credentials(&self, guid: &str) -> Result<BindingEndpoint> {
        let outcome = self
            .run(
                self.command(["curl".to_string(), format!("/v2/apps/{}/service_bindings", guid)]),
                "Failed to retrieve service bindings for app",
            )
            .await?;
        parse_binding_credentials(&outcome.stdout)
    }

    // ------------------------------------------------------------------
    // Service instances
    // ------------------------------------------------------------------

    /// `cf create-service <service> <plan> <instance>`, then wait for the
    /// broker to finish creating it
    ///
    /// A refusal because the plan quota is exhausted is not an error; it
    /// is reported as [`CreateServiceOutcome::QuotaReached`] and no wait
    /// happens.
    pub async fn create_service(
        &self,
        service: &str,
        plan: &str,
        instance: &str,
    ) -> Result<CreateServiceOutcome> {
        let outcome = self
            .run_until(
                self.command(["create-service", service, plan, instance]),
                self.short_timeout(),
                |outcome: &AttemptOutcome| create_succeeded(outcome) || quota_reached(outcome),
                "Failed to create Redis service instance",
            )
            .await?;

        if quota_reached(&outcome) {
            warn!(plan, "No Plan Instances available for testing {} plan", plan);
            return Ok(CreateServiceOutcome::QuotaReached);
        }

        self.await_service_creation(instance).await?;
        Ok(CreateServiceOutcome::Created)
    }

    /// Poll `cf service <instance>` until creation has succeeded
    pub async fn await_service_creation(&self, instance: &str) -> Result<()> {
        self.poll_until(
            self.command(["service", instance]),
            matches_output(literal("create succeeded")?),
            &format!("Failed to create Redis service instance {}", instance),
        )
        .await?;
        info!(instance, "service instance created");
        Ok(())
    }

    /// `cf delete-service -f <instance>`
    pub async fn delete_service(&self, instance: &str) -> Result<()> {
        self.run(
            self.command(["delete-service", "-f", instance]),
            &format!("Failed to delete service {}", instance),
        )
        .await?;
        Ok(())
    }

    /// Poll `cf service <instance>` until the instance is gone
    pub async fn ensure_service_instance_gone(&self, instance: &str) -> Result<()> {
        self.poll_until(
            self.command(["service", instance]),
            matches_output(literal(&format!(
                "Service instance {} not found",
                instance
            ))?),
            &format!("Failed to make sure service {} does not exist", instance),
        )
        .await?;
        Ok(())
    }

    /// Poll `cf services` until the space has no instances
    pub async fn ensure_all_service_instances_gone(&self) -> Result<()> {
        self.poll_until(
            self.command(["services"]),
            matches_output(literal("No services found")?),
            "Failed to make sure no service instances exist",
        )
        .await?;
        Ok(())
    }

    /// `cf bind-service <app> <instance>`
    pub async fn bind_service(&self, app: &str, instance: &str) -> Result<()> {
        self.run(
            self.command(["bind-service", app, instance]),
            "Failed to bind Redis service instance to test app",
        )
        .await?;
        Ok(())
    }

    /// `cf unbind-service <app> <instance>`
    ///
    /// An instance that no longer exists counts as unbound.
    pub async fn unbind_service(&self, app: &str, instance: &str) -> Result<()> {
        let pattern = Regex::new(&format!(
            "(OK|Service instance {} not found)",
            regex::escape(instance)
        ))?;
        self.run_until(
            self.command(["unbind-service", app, instance]),
            self.short_timeout(),
            matches_std_or_error_output(pattern),
            &format!("Failed to unbind {} instance from {}", instance, app),
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Service keys
    // ------------------------------------------------------------------

    /// `cf create-service-key <instance> <key>`
    pub async fn create_service_key(&self, instance: &str, key: &str) -> Result<()> {
        self.run(
            self.command(["create-service-key", instance, key]),
            &format!("Failed to create service key {}", key),
        )
        .await?;
        Ok(())
    }

    /// `cf service-key <instance> <key>`, decoded
    pub async fn service_key(&self, instance: &str, key: &str) -> Result<Credentials> {
        let outcome = self
            .run(
                self.command(["service-key", instance, key]),
                &format!("Failed to read service key {}", key),
            )
            .await?;
        parse_service_key(&outcome.stdout)
    }

    /// `cf delete-service-key -f <instance> <key>`
    pub async fn delete_service_key(&self, instance: &str, key: &str) -> Result<()> {
        self.run(
            self.command(["delete-service-key", "-f", instance, key]),
            &format!("Failed to delete service key {}", key),
        )
        .await?;
        Ok(())
    }
}

/// `cf create-service` exited zero and printed `OK`
pub fn create_succeeded(outcome: &AttemptOutcome) -> bool {
    outcome.succeeded() && outcome.stdout.contains("OK")
}

/// `cf create-service` failed because the plan quota is exhausted
pub fn quota_reached(outcome: &AttemptOutcome) -> bool {
    outcome.exit_code == Some(1)
        && outcome.stdout.contains("FAILED")
        && QUOTA_REACHED_PATTERNS
            .iter()
            .any(|pattern| outcome.stdout.contains(pattern))
}
