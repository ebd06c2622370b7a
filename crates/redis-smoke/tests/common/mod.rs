//! Shared test utilities for redis-smoke binary tests
//!
//! [`FakePlatform`] puts scripted `cf` and `curl` binaries on a private
//! `PATH` and writes a config file pointing at them, so the binary can run a
//! whole suite offline.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// `cf` stand-in; state and the call log live under `@STATE@`
const FAKE_CF: &str = r#"#!/bin/sh
echo "$*" >> "@STATE@/cf.log"
if [ -f "@STATE@/fail-$1" ]; then
  echo "FAILED"
  exit 1
fi
case "$1" in
  app)
    echo "6a3e1f0c-guid"
    ;;
  curl)
    echo '{"resources":[{"entity":{"credentials":{"host":"10.0.8.4","port":6379,"password":"s3cret"}}}]}'
    ;;
  service)
    if [ -f "@STATE@/deleted" ]; then
      echo "Service instance $2 not found"
    else
      echo "status: create succeeded"
    fi
    ;;
  delete-service)
    touch "@STATE@/deleted"
    echo "OK"
    ;;
  *)
    echo "OK"
    ;;
esac
exit 0
"#;

/// `curl` stand-in answering like the sample app
const FAKE_CURL: &str = r#"#!/bin/sh
echo "$*" >> "@STATE@/curl.log"
for last; do :; done
case "$*" in
  *PUT*) echo "success"; exit 0 ;;
esac
case "$last" in
  */ping) echo "key not present" ;;
  */mykey) echo "myvalue" ;;
  *) echo "" ;;
esac
exit 0
"#;

pub struct FakePlatform {
    dir: TempDir,
}

impl FakePlatform {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();

        let state = dir.path().display().to_string();
        for (name, script) in [("cf", FAKE_CF), ("curl", FAKE_CURL)] {
            let path = bin.join(name);
            fs::write(&path, script.replace("@STATE@", &state)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a config with one plan and no retry delays
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let config = format!(
            r#"{{
                "api": "api.sys.example.com",
                "apps_domain": "apps.example.com",
                "admin_user": "admin",
                "admin_password": "secret",
                "skip_ssl_validation": true,
                "service_name": "p-redis",
                "plan_names": ["shared-vm"],
                "retry": {{ "max_attempts": 1, "backoff": "none", "baseline_interval_milliseconds": 0 }},
                "timeouts": {{ "short_seconds": 30, "long_seconds": 30, "retry_interval_seconds": 0 }}
                {}
            }}"#,
            extra
        );
        let path = self.dir.path().join("config.json");
        fs::write(&path, config).unwrap();
        path
    }

    /// Make every call of `subcommand` fail
    pub fn fail(&self, subcommand: &str) {
        fs::write(self.dir.path().join(format!("fail-{}", subcommand)), "").unwrap();
    }

    /// Run the binary with the fake tools first on `PATH`
    pub fn run(&self, args: &[&str]) -> Output {
        let path = format!(
            "{}:/usr/local/bin:/usr/bin:/bin",
            self.dir.path().join("bin").display()
        );
        Command::new(env!("CARGO_BIN_EXE_redis-smoke"))
            .args(args)
            .env("PATH", path)
            .env_remove("CONFIG_PATH")
            .output()
            .unwrap()
    }

    pub fn cf_calls(&self) -> Vec<String> {
        self.log("cf.log")
    }

    pub fn curl_calls(&self) -> Vec<String> {
        self.log("curl.log")
    }

    fn log(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.dir.path().join(name))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
