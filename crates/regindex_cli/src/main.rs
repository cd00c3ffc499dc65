//! regindex CLI - keeps a document store in sync with GitLab's container registries.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::CollectArgs;

#[derive(Parser)]
#[command(name = "regindex")]
#[command(version)]
#[command(about = "Mirror GitLab container registry metadata into a document store")]
#[command(
    long_about = "regindex polls a GitLab instance for the container registry images of every \
project visible to its token, enriches them with sizes, ages, revision groups and the project \
README, and writes each image to CouchDB only when it changed. Images whose project is gone are \
removed."
)]
#[command(after_long_help = r#"EXAMPLES
    Run the collector until Ctrl+C:
        $ regindex run

    Collect once without writing anything:
        $ regindex once --dry-run

    Only sweep one registry:
        $ regindex run --registry registry.example.com

CONFIGURATION
    regindex reads configuration from:
      1. ~/.config/regindex/config.toml (or $XDG_CONFIG_HOME/regindex/config.toml)
      2. ./regindex.toml
      3. The file given with --config
      4. Environment variables (REGINDEX_ prefix, __ between levels)
      5. .env file in current directory

ENVIRONMENT VARIABLES
    REGINDEX_GITLAB__URL                  GitLab instance URL
    REGINDEX_GITLAB__TOKEN                GitLab access token
    REGINDEX_GITLAB__REGISTRY             Registry to sweep
    REGINDEX_COLLECTOR__UPDATE_INTERVAL_SECS  Pause between cycles (default: 1800)
    REGINDEX_STORE__URL                   CouchDB URL (default: http://localhost:5984)
    REGINDEX_STORE__USER                  CouchDB user
    REGINDEX_STORE__PASSWORD              CouchDB password
    RUST_LOG                              Log filter (default: regindex=info,regindex_cli=info)
"#)]
struct Cli {
    /// Additional config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect every update interval until interrupted
    Run {
        #[command(flatten)]
        args: CollectArgs,
    },
    /// Run a single cycle and print a summary
    Once {
        #[command(flatten)]
        args: CollectArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("regindex=info,regindex_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Load configuration (defaults -> files -> env vars)
    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { args } => commands::run::handle_run(args, &config).await,
        Commands::Once { args } => commands::once::handle_once(args, &config).await,
    }
}
