//! `tally agent run` - execute one agent script against the sandbox.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use tally_core::agentlog;
use tally_sandbox::{Bridge, BridgeConfig, Runtime};

/// Run the agent named `name` against the repository at `repo_root`.
pub async fn run(repo_root: &Path, name: &str, dry_run: bool) -> Result<()> {
    let repo_root = repo_root
        .canonicalize()
        .with_context(|| format!("resolving path {}", repo_root.display()))?;

    let script_path = repo_root.join("agents").join(format!("{name}.py"));
    let script = fs::read_to_string(&script_path)
        .with_context(|| format!("reading agent {name}"))?;

    let bridge = Bridge::spawn(BridgeConfig::default()).context("starting bridge")?;

    let runtime = Runtime::open(&repo_root, name, dry_run).context("creating runtime")?;
    Runtime::register_all(&runtime, &bridge);

    let externals = bridge.primitive_names();
    let run_result = bridge.run_script(&script, &externals).await;

    if let Err(err) = bridge.shutdown().await {
        warn!(%err, "bridge shutdown failed");
    }

    // Audit entries are persisted win or lose; the run's outcome is
    // decided afterwards.
    let entries = runtime.collected_log();
    if !entries.is_empty() {
        if let Err(err) = agentlog::append(&repo_root, &entries) {
            eprintln!("warning: failed to write agent log: {err}");
        }
    }

    let result = run_result.with_context(|| format!("agent {name} failed"))?;
    if result != Value::Null {
        println!("{result}");
    }

    Ok(())
}
