//! Config command

use anyhow::Result;
use camino::Utf8Path;
use redis_smoke_core::config::SmokeTestConfig;
use redis_smoke_core::LoadedConfig;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub async fn run(cmd: ConfigCommands, config_path: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show(args) => show(args, config_path),
    }
}

fn validate(config_path: Option<&Utf8Path>) -> Result<()> {
    let loaded = LoadedConfig::load_and_validate(config_path)?;
    let config = &loaded.config;

    output::success(&format!("Configuration is valid: {}", loaded.config_path));
    output::kv("API", &config.api);
    output::kv("Service", &config.service_name);
    output::kv("Plans", &plan_summary(config));

    let ha = config.ha_plans();
    if !ha.is_empty() {
        let names: Vec<_> = ha.iter().map(|p| p.name.as_str()).collect();
        output::kv("HA plans", &names.join(", "));
    }

    Ok(())
}

fn show(args: ConfigShowArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let loaded = LoadedConfig::load(config_path)?;
    let config = loaded.config.redacted();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    output::header(loaded.config_path.as_str());
    output::kv("API", &config.api);
    output::kv("Apps domain", &config.apps_domain);
    if let Some(login) = config.login_method() {
        output::kv("Login", login.description());
    }
    output::kv("Skip SSL validation", &config.skip_ssl_validation.to_string());
    output::kv("Service", &config.service_name);
    output::kv("Plans", &plan_summary(&config));
    output::kv("Security groups", &config.security_groups.len().to_string());
    output::kv("TLS versions", &config.tls_versions.join(", "));
    output::kv("Enforce TLS", &config.enforce_tls.to_string());
    output::kv("App path", config.app_path.as_str());
    output::kv(
        "Retry",
        &format!(
            "{} attempts, {} backoff from {}ms",
            config.retry.max_attempts, config.retry.backoff, config.retry.baseline_interval_milliseconds
        ),
    );
    output::kv(
        "Timeouts",
        &format!(
            "short {}s, long {}s",
            config.timeouts.short_seconds, config.timeouts.long_seconds
        ),
    );

    Ok(())
}

fn plan_summary(config: &SmokeTestConfig) -> String {
    config
        .all_plans()
        .iter()
        .map(|p| {
            if p.ha_enabled {
                format!("{} (ha)", p.name)
            } else {
                p.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
