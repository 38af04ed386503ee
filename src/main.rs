//! # Vocab Sync CLI (`vocab`)
//!
//! ## Usage
//!
//! ```bash
//! vocab --config ./config/vocab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vocab sync` | Sync every context page tagged in the contexts database |
//! | `vocab sync --root <id>` | Sync a single context page |
//! | `vocab reset` | Clear sync markers so contexts are re-processed |
//! | `vocab contexts` | List context pages and whether they are stale |
//! | `vocab lookup <word>` | Query the configured dictionary |
//!
//! The Notion token is read from the environment variable named by
//! `[workspace].token_env` (default `NOTION_KEY`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vocab_sync::{config, contexts, ingest, lookup_cmd};

/// Vocab Sync CLI: collect annotated vocabulary from context pages.
#[derive(Parser)]
#[command(
    name = "vocab",
    about = "Sync bold italic vocabulary from Notion context pages into word and expression databases",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vocab.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract units from stale contexts and link them to entries.
    ///
    /// Markers are committed only after every unit has been resolved.
    Sync {
        /// Sync this page instead of every tagged context.
        #[arg(long)]
        root: Option<String>,

        /// Show the units that would be processed without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear the last-extracted marker of contexts.
    Reset {
        /// Reset only this page.
        #[arg(long)]
        root: Option<String>,
    },

    /// List context pages with their marker and staleness.
    Contexts,

    /// Look up a word in the configured dictionary.
    Lookup {
        /// Word to look up.
        word: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync { root, dry_run } => {
            ingest::run_sync(&cfg, root, dry_run).await?;
        }
        Commands::Reset { root } => {
            ingest::run_reset(&cfg, root).await?;
        }
        Commands::Contexts => {
            contexts::list_contexts(&cfg).await?;
        }
        Commands::Lookup { word } => {
            lookup_cmd::run_lookup(&cfg, &word).await?;
        }
    }

    Ok(())
}
