//! Configuration file loading and validation

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fs;

use super::types::{LoginMethod, PlanConfig, SmokeTestConfig};
use crate::error::{Error, Result};

/// Environment variable naming the config file when no path is given
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// A loaded configuration and the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration
    pub config: SmokeTestConfig,

    /// Path to the configuration file
    pub config_path: Utf8PathBuf,
}

impl LoadedConfig {
    /// Load from `path`, or from `$CONFIG_PATH` when no path is given
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_owned(),
            None => Self::path_from_env()?,
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(config_path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let config = SmokeTestConfig::from_json(&content)?;
        tracing::debug!(path = %config_path, "loaded configuration");

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load and reject configurations the suites cannot run with
    pub fn load_and_validate(path: Option<&Utf8Path>) -> Result<Self> {
        let loaded = Self::load(path)?;
        loaded.config.validate()?;
        Ok(loaded)
    }

    fn path_from_env() -> Result<Utf8PathBuf> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(Utf8PathBuf::from(value)),
            _ => Err(Error::missing_env(CONFIG_PATH_ENV)),
        }
    }
}

impl SmokeTestConfig {
    /// Parse a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Check every required field and report all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.api.trim().is_empty() {
            problems.push("api is required".to_string());
        }
        if self.apps_domain.trim().is_empty() {
            problems.push("apps_domain is required".to_string());
        }
        if self.service_name.trim().is_empty() {
            problems.push("service_name is required".to_string());
        }
        if self.login_method().is_none() {
            problems.push(
                "either admin_client/admin_client_secret or admin_user/admin_password is required"
                    .to_string(),
            );
        }

        let plans = self.all_plans();
        if plans.is_empty() {
            problems.push("at least one plan is required in plan_names or plans".to_string());
        }
        if plans.iter().any(|p| p.name.trim().is_empty()) {
            problems.push("plan names must not be empty".to_string());
        }

        if self.name_prefix.trim().is_empty() {
            problems.push("name_prefix must not be empty".to_string());
        }
        if self.timeouts.short_seconds == 0 || self.timeouts.long_seconds == 0 {
            problems.push("timeouts must be greater than zero".to_string());
        }
        for version in &self.tls_versions {
            if !version.to_ascii_lowercase().starts_with("tls") {
                problems.push(format!("unrecognised TLS version '{}'", version));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_config_list(problems))
        }
    }

    /// Plans from `plan_names` and `plans`, de-duplicated by name
    ///
    /// An entry in `plans` takes precedence over the same name in
    /// `plan_names`. Order is `plan_names` first, then new names from
    /// `plans`.
    pub fn all_plans(&self) -> Vec<PlanConfig> {
        let mut merged: Vec<PlanConfig> = Vec::new();
        let mut seen = BTreeSet::new();

        for name in &self.plan_names {
            if seen.insert(name.as_str()) {
                let plan = self
                    .plans
                    .iter()
                    .find(|p| &p.name == name)
                    .cloned()
                    .unwrap_or_else(|| PlanConfig::new(name.clone()));
                merged.push(plan);
            }
        }
        for plan in &self.plans {
            if seen.insert(plan.name.as_str()) {
                merged.push(plan.clone());
            }
        }

        merged
    }

    /// Plans that deploy sentinel-managed replicas
    pub fn ha_plans(&self) -> Vec<PlanConfig> {
        self.all_plans()
            .into_iter()
            .filter(|p| p.ha_enabled)
            .collect()
    }

    /// Base URI of a pushed app named `app_name`
    pub fn app_uri(&self, app_name: &str) -> String {
        let scheme = if self.use_http_app { "http" } else { "https" };
        format!("{}://{}.{}", scheme, app_name, self.apps_domain)
    }

    /// Preferred admin login; client credentials win over a user login
    pub fn login_method(&self) -> Option<LoginMethod> {
        if !self.admin_client.is_empty() && !self.admin_client_secret.is_empty() {
            return Some(LoginMethod::Client {
                id: self.admin_client.clone(),
                secret: self.admin_client_secret.clone(),
            });
        }
        if !self.admin_user.is_empty() && !self.admin_password.is_empty() {
            return Some(LoginMethod::User {
                name: self.admin_user.clone(),
                password: self.admin_password.clone(),
            });
        }
        None
    }

    /// Copy with secrets blanked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [&mut copy.admin_password, &mut copy.admin_client_secret] {
            if !secret.is_empty() {
                *secret = "[REDACTED]".to_string();
            }
        }
        copy
    }
}
