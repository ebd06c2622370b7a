//! Service lifecycle suite
//!
//! Per plan: push the sample app, create an instance, bind it, open a
//! security group, start the app, then write and read a key through it.
//! TLS reads run for every configured TLS version.

use anyhow::Result;

use redis_smoke_cf::{BindingSource, RedisApp};
use redis_smoke_core::config::PlanConfig;

use super::{
    create_service_then, teardown_steps, PlanNames, SuiteContext, TEST_KEY, TEST_VALUE,
};
use crate::reporter::{step, PendingStep, Phase, SmokeTestReport};

/// Sample app reply for a key that was never written
const KEY_NOT_PRESENT: &str = "key not present";

/// Run the lifecycle checks for `plan`, then tear its resources down
pub async fn run_plan(
    ctx: &SuiteContext,
    plan: &PlanConfig,
    report: &mut SmokeTestReport,
) -> Result<()> {
    let names = PlanNames::generate(&ctx.config.name_prefix);
    let app = ctx.app(&names.app);
    tracing::info!(plan = %plan.name, app = %names.app, instance = %names.instance, "running lifecycle checks");

    let result = exercise(ctx, plan, &names, &app, report).await;
    let teardown = report
        .perform(Phase::Spec, teardown_steps(ctx, plan, &names, false))
        .await;

    result.and(teardown)
}

async fn exercise(
    ctx: &SuiteContext,
    plan: &PlanConfig,
    names: &PlanNames,
    app: &RedisApp,
    report: &mut SmokeTestReport,
) -> Result<()> {
    let push_args = ctx.push_args();
    report
        .perform(
            Phase::Spec,
            vec![step(
                "Push the redis sample app to Cloud Foundry",
                ctx.cf.push(&names.app, &push_args),
            )],
        )
        .await?;

    let remaining = spec_steps(ctx, plan, names, app);
    create_service_then(ctx, plan, names, report, remaining).await
}

fn spec_steps<'a>(
    ctx: &'a SuiteContext,
    plan: &'a PlanConfig,
    names: &'a PlanNames,
    app: &'a RedisApp,
) -> Vec<PendingStep<'a>> {
    let enforced = ctx.config.enforce_tls;
    let tls_versions = &ctx.config.tls_versions;

    let mut steps = vec![
        step(
            format!(
                "Bind the redis sample app '{}' to the '{}' plan instance '{}' of Redis",
                names.app, plan.name, names.instance
            ),
            ctx.cf.bind_service(&names.app, &names.instance),
        ),
        step(
            format!(
                "Create and bind security group '{}' for running smoke tests",
                names.security_group
            ),
            ctx.cf.create_and_bind_security_group(
                &names.security_group,
                BindingSource::App(&names.app),
                &ctx.org,
                &ctx.space,
                &ctx.config.security_groups,
            ),
        ),
        step("Start the app", ctx.cf.start(&names.app)),
        step(
            "Verify that the app is responding",
            app.is_running(enforced, tls_versions),
        ),
    ];

    if enforced {
        steps.push(step(
            "Verify that writes over the non-TLS port are refused",
            app.write(true, TEST_KEY, TEST_VALUE),
        ));
        steps.push(step(
            "Verify that reads over the non-TLS port are refused",
            app.read_assert(true, TEST_KEY, TEST_VALUE),
        ));
    } else {
        steps.push(step(
            "Write a key/value pair to Redis",
            app.write(false, TEST_KEY, TEST_VALUE),
        ));
        steps.push(step(
            "Read the key/value pair back",
            app.read_assert(false, TEST_KEY, TEST_VALUE),
        ));
    }

    // Nothing was written when the plain port is closed
    let expected = if enforced { KEY_NOT_PRESENT } else { TEST_VALUE };
    for version in tls_versions {
        steps.push(step(
            format!("Read the key/value pair back over {}", version),
            app.read_tls_assert(version, TEST_KEY, expected),
        ));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis_smoke_core::config::SmokeTestConfig;

    fn context(enforce_tls: bool) -> SuiteContext {
        let mut config = SmokeTestConfig::from_json(
            r#"{
                "api": "api.sys.example.com",
                "apps_domain": "apps.example.com",
                "admin_client": "admin",
                "admin_client_secret": "secret",
                "service_name": "p-redis",
                "plan_names": ["shared-vm"],
                "tls_versions": ["tlsv1.2", "tlsv1.3"]
            }"#,
        )
        .unwrap();
        config.enforce_tls = enforce_tls;
        SuiteContext::new(config, false).unwrap()
    }

    fn descriptions(ctx: &SuiteContext) -> Vec<String> {
        let plan = PlanConfig::new("shared-vm");
        let names = PlanNames::generate("redis-smoke");
        let app = ctx.app(&names.app);

        let mut report = SmokeTestReport::new();
        report.register(Phase::Spec, spec_steps(ctx, &plan, &names, &app));
        report
            .steps(Phase::Spec)
            .iter()
            .map(|s| s.description.clone())
            .collect()
    }

    #[test]
    fn test_plain_data_steps() {
        let steps = descriptions(&context(false));

        assert_eq!(steps.len(), 8);
        assert_eq!(steps[2], "Start the app");
        assert_eq!(steps[4], "Write a key/value pair to Redis");
        assert_eq!(steps[5], "Read the key/value pair back");
        assert_eq!(steps[7], "Read the key/value pair back over tlsv1.3");
    }

    #[test]
    fn test_enforced_tls_data_steps() {
        let steps = descriptions(&context(true));

        assert_eq!(steps.len(), 8);
        assert_eq!(steps[4], "Verify that writes over the non-TLS port are refused");
        assert_eq!(steps[5], "Verify that reads over the non-TLS port are refused");
        assert_eq!(steps[6], "Read the key/value pair back over tlsv1.2");
    }
}
