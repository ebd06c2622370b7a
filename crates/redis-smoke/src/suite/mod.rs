//! Smoke test suites
//!
//! A suite run sets up an org and space, exercises each selected plan, and
//! tears everything down again. Per-plan behaviour lives in [`lifecycle`]
//! and [`ha`]; this module owns the shared setup, teardown and naming.

pub mod ha;
pub mod lifecycle;

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

use redis_smoke_cf::{fail_reason, CfCli, CreateServiceOutcome, RedisApp};
use redis_smoke_core::config::{PlanConfig, SmokeTestConfig};

use crate::reporter::{step, PendingStep, Phase, SmokeTestReport, StepResult};

/// Quota applied to the test org
const QUOTA_ARGS: &[&str] = &[
    "-m",
    "10G",
    "-r",
    "1000",
    "-s",
    "100",
    "--allow-paid-service-plans",
];

/// Key and value written through the sample app
pub const TEST_KEY: &str = "mykey";
pub const TEST_VALUE: &str = "myvalue";

/// Which per-plan behaviour a run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Lifecycle,
    Ha,
}

impl SuiteKind {
    /// Report title for one plan
    pub fn title(&self, plan: &PlanConfig) -> String {
        match self {
            SuiteKind::Lifecycle => format!(
                "{}: create, bind to, write to, read from, unbind, and destroy a service instance",
                plan.name.to_uppercase()
            ),
            SuiteKind::Ha => format!(
                "{}: should successfully perform failover",
                plan.name.to_uppercase()
            ),
        }
    }
}

/// Everything shared by the plans of one run
pub struct SuiteContext {
    pub config: SmokeTestConfig,
    pub cf: CfCli,
    pub org: String,
    pub space: String,
    pub quota: String,
    pub keep_org: bool,
    _cf_home: TempDir,
}

impl SuiteContext {
    /// Generate org and space names and a private `CF_HOME`
    pub fn new(config: SmokeTestConfig, keep_org: bool) -> Result<Self> {
        let cf_home = tempfile::Builder::new()
            .prefix("cf-redis-smoke-tests")
            .tempdir()
            .context("Failed to create CF_HOME directory")?;
        let home = Utf8PathBuf::from_path_buf(cf_home.path().to_path_buf())
            .map_err(|p| anyhow!("CF_HOME path is not UTF-8: {}", p.display()))?;
        tracing::debug!(cf_home = %home, "using isolated CF_HOME");

        let prefix = config.name_prefix.clone();
        let cf = CfCli::from_config(&config).with_cf_home(home);

        Ok(Self {
            org: random_name(&format!("{}-org", prefix)),
            space: random_name(&format!("{}-space", prefix)),
            quota: format!("{}-quota", prefix),
            config,
            cf,
            keep_org,
            _cf_home: cf_home,
        })
    }

    /// Client for a sample app pushed as `app_name`
    pub fn app(&self, app_name: &str) -> RedisApp {
        RedisApp::new(
            self.config.app_uri(app_name),
            self.cf.short_timeout(),
            self.config.timeouts.retry_interval(),
        )
    }

    /// `cf push` arguments for the sample app
    pub fn push_args(&self) -> Vec<&str> {
        vec![
            "-m",
            "256M",
            "-p",
            self.config.app_path.as_str(),
            "-b",
            "ruby_buildpack",
            "--no-start",
        ]
    }
}

/// `<prefix>-<uuid>`
pub fn random_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Names of the resources one plan creates
#[derive(Debug, Clone)]
pub struct PlanNames {
    pub app: String,
    pub instance: String,
    pub security_group: String,
    pub service_key: String,
}

impl PlanNames {
    pub fn generate(prefix: &str) -> Self {
        Self {
            app: random_name(&format!("{}-app", prefix)),
            instance: random_name(&format!("{}-instance", prefix)),
            security_group: random_name(&format!("{}-sg", prefix)),
            service_key: random_name(&format!("{}-key", prefix)),
        }
    }
}

/// Description of the create-service step while it runs
///
/// The help text is dropped once creation succeeds.
pub fn create_service_description(plan: &PlanConfig) -> String {
    format!(
        "Create a '{}' plan instance of Redis\n    Please refer to http://docs.pivotal.io/redis/smoke-tests.html for more help on diagnosing this issue",
        plan.name
    )
}

/// Create the plan's service instance, then perform `remaining`
///
/// When the plan quota is exhausted the create step is marked skipped and
/// `remaining` is registered without running. A failed create leaves
/// `remaining` registered as not run.
pub async fn create_service_then<'a>(
    ctx: &'a SuiteContext,
    plan: &'a PlanConfig,
    names: &'a PlanNames,
    report: &mut SmokeTestReport,
    remaining: Vec<PendingStep<'a>>,
) -> Result<()> {
    let created = OnceLock::new();
    let create = step(create_service_description(plan), async {
        let outcome = ctx
            .cf
            .create_service(&ctx.config.service_name, &plan.name, &names.instance)
            .await?;
        let _ = created.set(outcome);
        anyhow::Ok(())
    });

    let outcome = report.perform(Phase::Spec, vec![create]).await;
    report.rename_last(
        Phase::Spec,
        format!("Create a '{}' plan instance of Redis", plan.name),
    );

    if let Err(e) = outcome {
        report.register(Phase::Spec, remaining);
        return Err(e);
    }

    if created.get().is_some_and(CreateServiceOutcome::is_skipped) {
        report.mark_last(Phase::Spec, StepResult::Skipped);
        report.register(Phase::Spec, remaining);
        return Ok(());
    }

    report.perform(Phase::Spec, remaining).await
}

pub fn before_suite_steps(ctx: &SuiteContext) -> Vec<PendingStep<'_>> {
    let login = ctx.config.login_method();
    let login_description = login
        .as_ref()
        .map(|l| l.description())
        .unwrap_or("Log in as admin");

    vec![
        step(
            "Connect to CloudFoundry",
            ctx.cf.api(&ctx.config.api, ctx.config.skip_ssl_validation),
        ),
        step(login_description, async move {
            let login =
                login.ok_or_else(|| anyhow!(fail_reason("No admin credentials configured")))?;
            ctx.cf.login(&login).await
        }),
        step(
            format!("Create '{}' quota", ctx.quota),
            ctx.cf.create_quota(&ctx.quota, QUOTA_ARGS),
        ),
        step(
            format!("Create '{}' org", ctx.org),
            ctx.cf.create_org(&ctx.org, &ctx.quota),
        ),
        step(
            format!("Enable service access for '{}' org", ctx.org),
            ctx.cf
                .enable_service_access(&ctx.org, &ctx.config.service_name),
        ),
        step(
            format!("Target '{}' org", ctx.org),
            ctx.cf.target_org(&ctx.org),
        ),
        step(
            format!("Create '{}' space", ctx.space),
            ctx.cf.create_space(&ctx.space),
        ),
        step(
            format!("Target '{}' org and '{}' space", ctx.org, ctx.space),
            ctx.cf.target_org_and_space(&ctx.org, &ctx.space),
        ),
    ]
}

pub fn after_suite_steps(ctx: &SuiteContext) -> Vec<PendingStep<'_>> {
    let mut steps = Vec::with_capacity(2);
    if !ctx.keep_org {
        steps.push(step(
            format!("Delete the '{}' org", ctx.org),
            ctx.cf.delete_org(&ctx.org),
        ));
    }
    steps.push(step("Log out", ctx.cf.logout()));
    steps
}

/// Teardown for one plan; runs whether or not the plan passed
pub fn teardown_steps<'a>(
    ctx: &'a SuiteContext,
    plan: &'a PlanConfig,
    names: &'a PlanNames,
    with_service_key: bool,
) -> Vec<PendingStep<'a>> {
    let mut steps = vec![
        step(
            format!("Unbind the {:?} plan instance", plan.name),
            ctx.cf.unbind_service(&names.app, &names.instance),
        ),
        step(
            format!("Delete security group '{}'", names.security_group),
            ctx.cf.delete_security_group(&names.security_group),
        ),
    ];
    if with_service_key {
        steps.push(step(
            format!(
                "Delete the service key {} for the {:?} plan instance",
                names.service_key, plan.name
            ),
            ctx.cf
                .delete_service_key(&names.instance, &names.service_key),
        ));
    }
    steps.extend([
        step(
            format!("Delete the {:?} plan instance", plan.name),
            ctx.cf.delete_service(&names.instance),
        ),
        step(
            format!(
                "Ensure service instance for plan {:?} has been deleted",
                plan.name
            ),
            ctx.cf.ensure_service_instance_gone(&names.instance),
        ),
        step("Delete the app", ctx.cf.delete_app(&names.app)),
    ]);
    steps
}

/// Run a suite over `plans` and return its report
///
/// Suite teardown always runs. Plans are skipped when setup fails.
pub async fn run(ctx: &SuiteContext, plans: &[PlanConfig], kind: SuiteKind) -> SmokeTestReport {
    let mut report = SmokeTestReport::new();

    report.suite_will_begin();
    let setup = report
        .perform(Phase::BeforeSuite, before_suite_steps(ctx))
        .await;
    report.before_suite_did_run(setup.as_ref().err());

    if setup.is_ok() {
        for plan in plans {
            let title = kind.title(plan);
            report.clear_spec_steps();
            report.spec_will_run(&title);

            let outcome = match kind {
                SuiteKind::Lifecycle => lifecycle::run_plan(ctx, plan, &mut report).await,
                SuiteKind::Ha => ha::run_plan(ctx, plan, &mut report).await,
            };
            report.spec_did_complete(&title, outcome.as_ref().err());
        }
    }

    let teardown = report
        .perform(Phase::AfterSuite, after_suite_steps(ctx))
        .await;
    report.after_suite_did_run(teardown.as_ref().err());
    report.suite_did_end();

    report
}
