//! tally - agentic small business accounting.
//!
//! CLI driver: initializes repositories and runs agent scripts against the
//! sandbox runtime.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

/// tally - agentic small business accounting
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new set of books
    Init {
        /// Directory to initialize (defaults to the current directory)
        directory: Option<PathBuf>,

        /// Business name
        #[arg(long)]
        name: String,

        /// Entity type
        #[arg(long, default_value = "llc_single_member")]
        entity_type: String,
    },

    /// Agent operations
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AgentCommands {
    /// Run an agent script
    Run {
        /// Agent name (script at agents/<name>.py)
        name: String,

        /// Repository directory
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Run without making changes
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init {
            directory,
            name,
            entity_type,
        } => {
            let dir = directory.unwrap_or_else(|| PathBuf::from("."));
            commands::init::run(&dir, &name, &entity_type)
        }
        Commands::Agent {
            command: AgentCommands::Run { name, repo, dry_run },
        } => commands::agent::run(&repo, &name, dry_run).await,
    }
}
