//! HA command - failover suite

use anyhow::Result;
use camino::Utf8Path;
use redis_smoke_core::LoadedConfig;

use super::run::{execute, finish, select_plans};
use crate::cli::RunArgs;
use crate::output;
use crate::suite::SuiteKind;

pub async fn run(args: RunArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let loaded = LoadedConfig::load_and_validate(config_path)?;
    tracing::info!(config = %loaded.config_path, "loaded configuration");

    let plans = select_plans(loaded.config.ha_plans(), &args.plans)?;
    if plans.is_empty() {
        output::warning("No HA-enabled plans configured; nothing to test");
        return Ok(());
    }

    let report = execute(loaded, plans, args.keep_org, SuiteKind::Ha).await?;
    finish(&report)
}
