//! # Deskhand CLI (`deskhand`)
//!
//! ## Usage
//!
//! ```bash
//! deskhand --config ./config/deskhand.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `deskhand init` | Create the escalation database |
//! | `deskhand chunks` | Chunk the corpus and print statistics |
//! | `deskhand ask "<question>"` | Answer one question from the corpus |
//! | `deskhand chat` | Interactive conversation on stdin |
//! | `deskhand escalations` | List recorded follow-up requests |
//! | `deskhand serve` | Start the HTTP turn server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use deskhand::sqlite_store::SqliteEscalationStore;
use deskhand::{commands, config, logging, server};

/// Deskhand: answers questions from a fixed corpus and hands the rest to
/// a human.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/deskhand.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "deskhand",
    about = "Deskhand: grounded answers from a fixed corpus, with human follow-up when it has none",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/deskhand.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the escalation database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Chunk the corpus and print statistics.
    ///
    /// Does not call the embedding provider.
    Chunks {
        /// Print a preview of the first N chunks.
        #[arg(long, default_value_t = 0)]
        show: usize,
    },

    /// Answer a single question through retrieval and synthesis.
    Ask {
        /// The question.
        question: String,
    },

    /// Start an interactive conversation on stdin.
    Chat,

    /// List recorded escalations, newest first.
    Escalations {
        /// Maximum number of records to print.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Start the HTTP turn server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging);

    match cli.command {
        Commands::Init => {
            SqliteEscalationStore::open(&cfg).await?.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Chunks { show } => {
            commands::run_chunks(&cfg, show)?;
        }
        Commands::Ask { question } => {
            commands::run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            commands::run_chat(&cfg).await?;
        }
        Commands::Escalations { limit } => {
            commands::run_escalations(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
