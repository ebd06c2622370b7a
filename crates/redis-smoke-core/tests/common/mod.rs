//! Shared test utilities for redis-smoke-core integration tests

use redis_smoke_core::process::CommandSpec;
use std::path::Path;

/// A shell command spec
pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

/// A script that fails until it has been run `failures` times, counting
/// runs in `counter`
pub fn flaky_script(counter: &Path, failures: u32) -> String {
    let path = counter.display();
    format!(
        "n=$(cat {path} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {path}; \
         if [ $n -le {failures} ]; then echo \"attempt $n failed\" >&2; exit 1; fi; \
         echo \"create succeeded\""
    )
}

/// Number of runs recorded by a flaky script
pub fn runs(counter: &Path) -> u32 {
    std::fs::read_to_string(counter)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}
