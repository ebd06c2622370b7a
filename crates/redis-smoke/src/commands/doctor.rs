//! Doctor command - check the tools the suites shell out to

use anyhow::{bail, Result};
use owo_colors::OwoColorize;

/// Binaries every suite run needs on `PATH`
const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("cf", "Cloud Foundry CLI"),
    ("curl", "queries the sample app"),
];

pub async fn run() -> Result<()> {
    println!("{}", "Required tools".bold());
    println!("{}", "─".repeat(40));

    let mut missing = 0;
    for (tool, purpose) in REQUIRED_TOOLS {
        match which::which(tool) {
            Ok(path) => println!(
                "  {} {} {}",
                "✓".green(),
                tool,
                path.display().to_string().dimmed()
            ),
            Err(_) => {
                missing += 1;
                println!("  {} {} {}", "✗".red(), tool, purpose.dimmed());
            }
        }
    }

    println!();
    if missing > 0 {
        bail!("{} required tool(s) missing", missing);
    }
    println!("{}", "All required tools available.".green());
    Ok(())
}
