//! CfCli against a scripted `cf` binary
//!
//! Each test installs a fresh fake `cf`; tests run serially so no script is
//! executed while another test still has one open for writing.

#![cfg(unix)]

mod common;

use common::FakeCf;
use redis_smoke_cf::{BindingSource, CreateServiceOutcome, Credentials};
use redis_smoke_core::config::{LoginMethod, SecurityGroupRule};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_api_and_auth_argument_vectors() {
    let cf = FakeCf::new();
    let cli = cf.cli();

    cli.api("api.sys.example.com", true).await.unwrap();
    cli.auth("admin", "hunter2").await.unwrap();
    cli.login(&LoginMethod::Client {
        id: "smoke-client".into(),
        secret: "s3cret".into(),
    })
    .await
    .unwrap();

    assert_eq!(
        cf.calls(),
        [
            "api api.sys.example.com --skip-ssl-validation",
            "auth admin hunter2",
            "auth smoke-client s3cret --client-credentials",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_org_and_space_setup() {
    let cf = FakeCf::new();
    let cli = cf.cli();

    cli.create_quota("redis-smoke-quota", &["-m", "10G", "--allow-paid-service-plans"])
        .await
        .unwrap();
    cli.create_org("smoke-org", "redis-smoke-quota").await.unwrap();
    cli.enable_service_access("smoke-org", "p-redis").await.unwrap();
    cli.enable_service_access_for_plan("smoke-org", "p-redis", "on-demand-cache")
        .await
        .unwrap();
    cli.target_org("smoke-org").await.unwrap();
    cli.create_space("smoke-space").await.unwrap();
    cli.target_org_and_space("smoke-org", "smoke-space").await.unwrap();
    cli.delete_org("smoke-org").await.unwrap();

    assert_eq!(
        cf.calls(),
        [
            "create-quota redis-smoke-quota -m 10G --allow-paid-service-plans",
            "create-org smoke-org -q redis-smoke-quota",
            "disable-service-access -o smoke-org p-redis",
            "enable-service-access -o smoke-org p-redis",
            "disable-service-access -o smoke-org -p on-demand-cache p-redis",
            "enable-service-access -o smoke-org -p on-demand-cache p-redis",
            "target -o smoke-org",
            "create-space smoke-space",
            "target -o smoke-org -s smoke-space",
            "delete-org -f smoke-org",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_failing_command_is_retried_then_reported() {
    let cf = FakeCf::new();
    cf.respond("target", "FAILED\nOrganization 'missing' not found.\n", 1);

    let err = cf.cli().target_org("missing").await.unwrap_err();

    assert_eq!(cf.calls().len(), 3);
    assert!(err
        .to_string()
        .contains(r#"{"FailReason": "Failed to target test org"}"#));
}

#[tokio::test]
#[serial]
async fn test_flaky_command_recovers() {
    let cf = FakeCf::new();
    cf.respond_nth("push", 1, "FAILED\nStaging error\n", 1);

    cf.cli()
        .push("redis-app", &["-m", "256M", "--no-start"])
        .await
        .unwrap();

    assert_eq!(
        cf.calls(),
        [
            "push redis-app -m 256M --no-start",
            "push redis-app -m 256M --no-start",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_create_service_waits_for_creation() {
    let cf = FakeCf::new();
    cf.respond("create-service", "Creating service instance...\nOK\n", 0);
    cf.respond("service", "name: my-redis\nstatus: create succeeded\n", 0);

    let outcome = cf
        .cli()
        .create_service("p-redis", "shared-vm", "my-redis")
        .await
        .unwrap();

    assert_eq!(outcome, CreateServiceOutcome::Created);
    assert_eq!(
        cf.calls(),
        ["create-service p-redis shared-vm my-redis", "service my-redis"]
    );
}

#[tokio::test]
#[serial]
async fn test_create_service_quota_reached_skips_wait() {
    let cf = FakeCf::new();
    cf.respond(
        "create-service",
        "FAILED\nThe quota for this service plan has been exceeded. Please contact your Operator.\n",
        1,
    );

    let outcome = cf
        .cli()
        .create_service("p-redis", "dedicated-vm", "my-redis")
        .await
        .unwrap();

    assert!(outcome.is_skipped());
    assert_eq!(cf.calls(), ["create-service p-redis dedicated-vm my-redis"]);
}

#[tokio::test]
#[serial]
async fn test_unbind_accepts_missing_instance_on_stderr() {
    let cf = FakeCf::new();
    cf.respond_stderr("unbind-service", "Service instance my-redis not found\n", 1);

    cf.cli().unbind_service("redis-app", "my-redis").await.unwrap();

    assert_eq!(cf.calls(), ["unbind-service redis-app my-redis"]);
}

#[tokio::test]
#[serial]
async fn test_ensure_service_instance_gone() {
    let cf = FakeCf::new();
    cf.respond("service", "FAILED\nService instance my-redis not found\n", 1);

    cf.cli().ensure_service_instance_gone("my-redis").await.unwrap();
    assert_eq!(cf.calls(), ["service my-redis"]);
}

#[tokio::test]
#[serial]
async fn test_ensure_all_service_instances_gone() {
    let cf = FakeCf::new();
    cf.respond("services", "Getting services in org...\n\nNo services found\n", 0);

    cf.cli().ensure_all_service_instances_gone().await.unwrap();
    assert_eq!(cf.calls(), ["services"]);
}

#[tokio::test]
#[serial]
async fn test_service_key_round_trip() {
    let cf = FakeCf::new();
    cf.respond(
        "service-key",
        "Getting key smoke-key for service instance my-redis as admin...\n\n\
         {\"host\": \"10.0.8.4\", \"port\": 6379, \"password\": \"pw\"}\n",
        0,
    );
    let cli = cf.cli();

    cli.create_service_key("my-redis", "smoke-key").await.unwrap();
    let credentials = cli.service_key("my-redis", "smoke-key").await.unwrap();
    cli.delete_service_key("my-redis", "smoke-key").await.unwrap();

    assert_eq!(credentials.host, "10.0.8.4");
    assert_eq!(credentials.port, 6379);
    assert_eq!(
        cf.calls(),
        [
            "create-service-key my-redis smoke-key",
            "service-key my-redis smoke-key",
            "delete-service-key -f my-redis smoke-key",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_security_group_from_app_binding() {
    let cf = FakeCf::new();
    cf.respond("app", "1d2c3b4a-guid\n", 0);
    cf.respond(
        "curl",
        r#"{"resources": [{"entity": {"credentials": {"host": "10.0.16.5", "port": 32768}}}]}"#,
        0,
    );
    let extra = SecurityGroupRule::tcp("10.0.0.53", 53);

    cf.cli()
        .create_and_bind_security_group(
            "smoke-sg",
            BindingSource::App("redis-app"),
            "smoke-org",
            "smoke-space",
            &[extra],
        )
        .await
        .unwrap();

    let calls = cf.calls();
    assert_eq!(calls[0], "app --guid redis-app");
    assert_eq!(calls[1], "curl /v2/apps/1d2c3b4a-guid/service_bindings");
    assert!(calls[2].starts_with("create-security-group smoke-sg "));
    assert!(calls[2].ends_with(".json"));
    assert_eq!(calls[3], "bind-security-group smoke-sg smoke-org smoke-space");
}

#[tokio::test]
#[serial]
async fn test_security_group_from_service_key() {
    let cf = FakeCf::new();
    let credentials = Credentials {
        host: "10.0.8.4".into(),
        port: 6379,
        password: String::new(),
        tls_port: None,
    };

    cf.cli()
        .create_and_bind_security_group(
            "smoke-sg",
            BindingSource::ServiceKey(&credentials),
            "smoke-org",
            "smoke-space",
            &[],
        )
        .await
        .unwrap();

    let calls = cf.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("create-security-group smoke-sg"));
}

#[tokio::test]
#[serial]
async fn test_app_and_user_operations() {
    let cf = FakeCf::new();
    let cli = cf.cli();

    cli.start("redis-app").await.unwrap();
    cli.set_env("redis-app", "SERVICE_NAME", "my-redis").await.unwrap();
    cli.bind_service("redis-app", "my-redis").await.unwrap();
    cli.delete_service("my-redis").await.unwrap();
    cli.delete_app("redis-app").await.unwrap();
    cli.delete_security_group("smoke-sg").await.unwrap();
    cli.create_user("smoke-user", "pw").await.unwrap();
    cli.set_space_role("smoke-user", "smoke-org", "smoke-space", "SpaceDeveloper")
        .await
        .unwrap();
    cli.delete_user("smoke-user").await.unwrap();
    cli.logout().await.unwrap();

    assert_eq!(
        cf.calls(),
        [
            "start redis-app",
            "set-env redis-app SERVICE_NAME my-redis",
            "bind-service redis-app my-redis",
            "delete-service -f my-redis",
            "delete redis-app -f -r",
            "delete-security-group smoke-sg -f",
            "create-user smoke-user pw",
            "set-space-role smoke-user smoke-org smoke-space SpaceDeveloper",
            "delete-user -f smoke-user",
            "logout",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_missing_cf_binary() {
    let cli = FakeCf::new().cli().with_binary("/nonexistent/cf");
    assert!(!cli.check_installed());

    let err = cli.logout().await.unwrap_err();
    assert!(err.to_string().contains("failed to start attempt"));
}
