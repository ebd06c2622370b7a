//! Run command - service lifecycle suite

use anyhow::{anyhow, bail, Result};
use camino::Utf8Path;
use redis_smoke_core::config::PlanConfig;
use redis_smoke_core::LoadedConfig;

use crate::cli::RunArgs;
use crate::output;
use crate::reporter::SmokeTestReport;
use crate::suite::{self, SuiteContext, SuiteKind};

pub async fn run(args: RunArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let loaded = LoadedConfig::load_and_validate(config_path)?;
    tracing::info!(config = %loaded.config_path, "loaded configuration");

    let plans = select_plans(loaded.config.all_plans(), &args.plans)?;
    let report = execute(loaded, plans, args.keep_org, SuiteKind::Lifecycle).await?;
    finish(&report)
}

/// Build the suite context and run `plans`
pub(crate) async fn execute(
    loaded: LoadedConfig,
    plans: Vec<PlanConfig>,
    keep_org: bool,
    kind: SuiteKind,
) -> Result<SmokeTestReport> {
    let ctx = SuiteContext::new(loaded.config, keep_org)?;
    if !ctx.cf.check_installed() {
        bail!(
            "'{}' was not found on PATH. Run `redis-smoke doctor` for details.",
            ctx.cf.binary()
        );
    }

    output::info(&format!(
        "Running {} plan(s) in org '{}' space '{}'",
        plans.len(),
        ctx.org,
        ctx.space
    ));
    Ok(suite::run(&ctx, &plans, kind).await)
}

/// Turn the report into the process outcome
pub(crate) fn finish(report: &SmokeTestReport) -> Result<()> {
    if report.passed() {
        output::success(&format!("{} plan(s) passed", report.test_count()));
        Ok(())
    } else {
        Err(anyhow!(
            "Smoke tests failed ({} failure(s) across {} plan(s))",
            report.failure_count(),
            report.test_count()
        ))
    }
}

/// Restrict `plans` to the names in `requested`, keeping config order
///
/// An empty `requested` keeps every plan. Unknown names are an error.
pub(crate) fn select_plans(plans: Vec<PlanConfig>, requested: &[String]) -> Result<Vec<PlanConfig>> {
    if requested.is_empty() {
        return Ok(plans);
    }

    let unknown: Vec<&str> = requested
        .iter()
        .filter(|name| !plans.iter().any(|p| &p.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("Unknown plan(s): {}", unknown.join(", "));
    }

    Ok(plans
        .into_iter()
        .filter(|p| requested.contains(&p.name))
        .collect())
}
