//! Live Cloud Foundry tests
//!
//! These need a reachable foundation, an admin login and the Redis tile.
//! Run with: CONFIG_PATH=redis-config.json cargo test --test live_smoke_tests -- --ignored

use redis_smoke_cf::CfCli;
use redis_smoke_core::LoadedConfig;

fn live_cli() -> Option<(CfCli, redis_smoke_core::SmokeTestConfig)> {
    let loaded = match LoadedConfig::load_and_validate(None) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            return None;
        }
    };
    let cli = CfCli::from_config(&loaded.config);
    if !cli.check_installed() {
        eprintln!("Skipping test: cf not installed");
        return None;
    }
    Some((cli, loaded.config))
}

#[tokio::test]
#[ignore] // Requires a Cloud Foundry foundation
async fn test_login_and_logout() {
    let Some((cli, config)) = live_cli() else {
        return;
    };
    let home = tempfile::TempDir::new().unwrap();
    let cli = cli.with_cf_home(camino::Utf8PathBuf::from_path_buf(home.path().to_path_buf()).unwrap());

    cli.api(&config.api, config.skip_ssl_validation)
        .await
        .expect("Failed to target Cloud Foundry");
    let login = config.login_method().expect("no admin login configured");
    cli.login(&login).await.expect("Failed to log in");
    cli.logout().await.expect("Failed to log out");
}
