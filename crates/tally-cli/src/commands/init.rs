//! `tally init` - create a repository skeleton and the initial commit.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use tally_core::chart::{default_chart, ChartService};
use tally_core::config::{Config, CONFIG_FILE};
use tally_core::vcs::{GitStore, VersionedStore};

const DIRECTORIES: &[&str] = &[
    "accounts",
    "rules",
    "agents",
    "scripts",
    "templates",
    "tests",
    "logs",
    "import",
    "import/processed",
];

const GITIGNORE: &str = "receipts/\nexports/\nqueue/\n.tally-cache/\n";

/// Initialize a new repository at `dir`.
pub fn run(dir: &Path, name: &str, entity_type: &str) -> Result<()> {
    for sub in DIRECTORIES {
        fs::create_dir_all(dir.join(sub))
            .with_context(|| format!("creating directory {sub}"))?;
    }

    let config = Config::default_for(name, entity_type);
    config
        .save(dir.join(CONFIG_FILE))
        .context("writing config")?;

    ChartService::new(default_chart(entity_type))
        .save(dir)
        .context("writing chart of accounts")?;

    fs::write(
        dir.join("rules/categorization-rules.yaml"),
        "rules: []\n",
    )
    .context("writing rules")?;

    fs::write(dir.join(".gitignore"), GITIGNORE).context("writing .gitignore")?;
    fs::write(dir.join("import/.gitkeep"), "").context("writing .gitkeep")?;

    let store = GitStore;
    store.init(dir).context("initializing versioned store")?;
    let hash = store
        .commit_all(
            dir,
            &format!("init: Initialize {name}"),
            &config.git.author_name,
            &config.git.author_email,
        )
        .context("initial commit")?;

    println!("Initialized tally books at {} ({hash})", dir.display());
    Ok(())
}
