//! RagBot CLI: the main entry point.
//!
//! Commands:
//! - `init`    : write the default config
//! - `chat`    : interactive chat or single-message mode
//! - `ingest`  : load `key|text` lines into the knowledge store
//! - `status`  : show configuration and knowledge store size

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ragbot",
    about = "RagBot: retrieval-augmented chat with a token-budgeted prompt",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Chat with the bot
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation to continue (persisted with the sqlite memory backend)
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Load `key|text` lines into the knowledge store
    Ingest {
        /// File with one `key|text` item per line
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show configuration and knowledge store status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Chat { message, session } => commands::chat::run(message, session).await?,
        Commands::Ingest { file } => commands::ingest::run(file).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
