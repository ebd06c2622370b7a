//! Failover suite for HA-enabled plans
//!
//! After the usual write and read, the sentinel view of the master and the
//! replicas is validated, a manual failover is triggered through the sample
//! app, and the new topology is checked against the old one: a former
//! replica must have been promoted and the old master must have rejoined as
//! a replica.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, Result};

use redis_smoke_cf::ha::{
    parse_master_info, parse_replica_info, validate_failover, validate_master, validate_replicas,
};
use redis_smoke_cf::{
    fail_reason, BindingSource, Credentials, HaError, RedisApp, RedisMasterInfo, RedisReplicaInfo,
};
use redis_smoke_core::config::PlanConfig;

use super::{
    create_service_then, teardown_steps, PlanNames, SuiteContext, TEST_KEY, TEST_VALUE,
};
use crate::reporter::{step, PendingStep, Phase, SmokeTestReport};

/// Time sentinel gets to finish a failover
pub const FAILOVER_SETTLE_TIME: Duration = Duration::from_secs(20);

fn ha_failure(error: HaError) -> anyhow::Error {
    anyhow!(fail_reason(&error.to_string()))
}

/// Sentinel view captured before or after the failover
#[derive(Default)]
struct Topology {
    master: OnceLock<RedisMasterInfo>,
    replicas: OnceLock<Vec<RedisReplicaInfo>>,
}

impl Topology {
    fn master(&self) -> Result<&RedisMasterInfo> {
        self.master
            .get()
            .ok_or_else(|| anyhow!(fail_reason("Sentinel master was not read")))
    }

    fn replicas(&self) -> Result<&[RedisReplicaInfo]> {
        self.replicas
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!(fail_reason("Sentinel replicas were not read")))
    }
}

/// Run the failover checks for `plan`, then tear its resources down
pub async fn run_plan(
    ctx: &SuiteContext,
    plan: &PlanConfig,
    report: &mut SmokeTestReport,
) -> Result<()> {
    let names = PlanNames::generate(&ctx.config.name_prefix);
    let app = ctx.app(&names.app);
    tracing::info!(plan = %plan.name, app = %names.app, instance = %names.instance, "running failover checks");

    let result = exercise(ctx, plan, &names, &app, report).await;
    let teardown = report
        .perform(Phase::Spec, teardown_steps(ctx, plan, &names, true))
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
            vec![
                step(
                    "Push the redis sample app to Cloud Foundry",
                    ctx.cf.push(&names.app, &push_args),
                ),
                step(
                    format!("Enable service plan access for '{}' org", ctx.org),
                    ctx.cf.enable_service_access_for_plan(
                        &ctx.org,
                        &ctx.config.service_name,
                        &plan.name,
                    ),
                ),
            ],
        )
        .await?;

    let credentials = OnceLock::new();
    let before = Topology::default();
    let after = Topology::default();

    let mut remaining = setup_steps(ctx, plan, names, app, &credentials);
    remaining.extend(failover_steps(app, &before, &after));
    create_service_then(ctx, plan, names, report, remaining).await
}

fn setup_steps<'a>(
    ctx: &'a SuiteContext,
    plan: &'a PlanConfig,
    names: &'a PlanNames,
    app: &'a RedisApp,
    credentials: &'a OnceLock<Credentials>,
) -> Vec<PendingStep<'a>> {
    vec![
        step(
            format!(
                "Bind the redis sample app '{}' to the '{}' plan instance '{}' of Redis",
                names.app, plan.name, names.instance
            ),
            ctx.cf.bind_service(&names.app, &names.instance),
        ),
        step(
            format!(
                "Create service key for the '{}' plan instance '{}' of Redis",
                plan.name, names.instance
            ),
            ctx.cf.create_service_key(&names.instance, &names.service_key),
        ),
        step("Read the Service Key", async move {
            let key = ctx
                .cf
                .service_key(&names.instance, &names.service_key)
                .await?;
            let _ = credentials.set(key);
            anyhow::Ok(())
        }),
        step(
            format!(
                "Create and bind security group '{}' for running smoke tests",
                names.security_group
            ),
            async move {
                let key = credentials
                    .get()
                    .ok_or_else(|| anyhow!(fail_reason("Service key was not read")))?;
                ctx.cf
                    .create_and_bind_security_group(
                        &names.security_group,
                        BindingSource::ServiceKey(key),
                        &ctx.org,
                        &ctx.space,
                        &ctx.config.security_groups,
                    )
                    .await
            },
        ),
        step("Start the app", ctx.cf.start(&names.app)),
        step(
            "Verify that the app is responding",
            app.is_running(ctx.config.enforce_tls, &ctx.config.tls_versions),
        ),
    ]
}

fn write_read_steps(app: &RedisApp) -> Vec<PendingStep<'_>> {
    vec![
        step(
            "Write a key/value pair to Redis",
            app.write(false, TEST_KEY, TEST_VALUE),
        ),
        step(
            "Read the key/value pair back",
            app.read_assert(false, TEST_KEY, TEST_VALUE),
        ),
    ]
}

fn topology_steps<'a>(app: &'a RedisApp, topology: &'a Topology, label: &str) -> Vec<PendingStep<'a>> {
    vec![
        step(format!("Validate the {} master", label), async move {
            let body = app.read("master").await?;
            let master = parse_master_info(&body).map_err(ha_failure)?;
            validate_master(&master).map_err(ha_failure)?;
            tracing::info!(ip = %master.ip, runid = %master.runid, "sentinel master");
            let _ = topology.master.set(master);
            anyhow::Ok(())
        }),
        step(format!("Validate the {} replicas", label), async move {
            let body = app.read("replicas").await?;
            let replicas = parse_replica_info(&body).map_err(ha_failure)?;
            validate_replicas(&replicas).map_err(ha_failure)?;
            let _ = topology.replicas.set(replicas);
            anyhow::Ok(())
        }),
    ]
}

fn failover_steps<'a>(
    app: &'a RedisApp,
    before: &'a Topology,
    after: &'a Topology,
) -> Vec<PendingStep<'a>> {
    let mut steps = write_read_steps(app);
    steps.extend(topology_steps(app, before, "current"));
    steps.push(step(
        "Perform manual failover",
        app.read_assert(false, "failover", "OK"),
    ));
    steps.push(step(
        format!(
            "Wait {} seconds before failover completes",
            FAILOVER_SETTLE_TIME.as_secs()
        ),
        async {
            tokio::time::sleep(FAILOVER_SETTLE_TIME).await;
            anyhow::Ok(())
        },
    ));
    steps.extend(topology_steps(app, after, "new"));
    steps.push(step(
        "Verify that a replica was promoted and the old master rejoined",
        async move {
            validate_failover(
                before.master()?,
                after.master()?,
                before.replicas()?,
                after.replicas()?,
            )
            .map_err(ha_failure)
        },
    ));
    steps.extend(write_read_steps(app));
    steps
}
