//! Shared test utilities for redis-smoke-cf integration tests
//!
//! [`FakeCf`] installs a shell script standing in for the `cf` binary. The
//! script appends its arguments to `$CF_HOME/calls.log` and answers from
//! files under `$CF_HOME/responses/`:
//!
//! - `<subcommand>.<n>.out` / `.code` for the n-th call (1-based)
//! - `<subcommand>.out` / `.err` / `.code` otherwise
//!
//! Without a response file the script prints `OK` and exits 0.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use camino::Utf8PathBuf;
use redis_smoke_cf::CfCli;
use redis_smoke_core::retry::Backoff;
use tempfile::TempDir;

const FAKE_CF: &str = r#"#!/bin/sh
echo "$*" >> "$CF_HOME/calls.log"
n=$(grep -cE "^$1( |$)" "$CF_HOME/calls.log")
resp="$CF_HOME/responses/$1"
if [ -f "$resp.$n.out" ]; then
  cat "$resp.$n.out"
  if [ -f "$resp.$n.code" ]; then exit "$(cat "$resp.$n.code")"; fi
  exit 0
fi
if [ -f "$resp.out" ]; then cat "$resp.out"; else echo OK; fi
if [ -f "$resp.err" ]; then cat "$resp.err" >&2; fi
if [ -f "$resp.code" ]; then exit "$(cat "$resp.code")"; fi
exit 0
"#;

/// A scripted `cf` with its own CF_HOME
pub struct FakeCf {
    dir: TempDir,
}

impl FakeCf {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("responses")).unwrap();

        let script = dir.path().join("cf");
        fs::write(&script, FAKE_CF).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir }
    }

    pub fn home(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf()).unwrap()
    }

    /// A wrapper with short timeouts and no backoff delay
    pub fn cli(&self) -> CfCli {
        CfCli::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            2,
            Backoff::None(Duration::ZERO),
        )
        .with_binary(self.home().join("cf").as_str())
        .with_cf_home(self.home())
    }

    /// Answer every `subcommand` call with `stdout` and `code`
    pub fn respond(&self, subcommand: &str, stdout: &str, code: i32) {
        let base = self.dir.path().join("responses").join(subcommand);
        fs::write(base.with_extension("out"), stdout).unwrap();
        fs::write(base.with_extension("code"), code.to_string()).unwrap();
    }

    /// Answer `subcommand` on stderr instead of stdout
    pub fn respond_stderr(&self, subcommand: &str, stderr: &str, code: i32) {
        let base = self.dir.path().join("responses").join(subcommand);
        fs::write(base.with_extension("out"), "").unwrap();
        fs::write(base.with_extension("err"), stderr).unwrap();
        fs::write(base.with_extension("code"), code.to_string()).unwrap();
    }

    /// Answer only the `n`-th call of `subcommand`
    pub fn respond_nth(&self, subcommand: &str, n: u32, stdout: &str, code: i32) {
        let responses = self.dir.path().join("responses");
        fs::write(responses.join(format!("{}.{}.out", subcommand, n)), stdout).unwrap();
        fs::write(
            responses.join(format!("{}.{}.code", subcommand, n)),
            code.to_string(),
        )
        .unwrap();
    }

    /// Argument lines of every call so far
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
