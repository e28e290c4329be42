//! SAM CLI — the main entry point.
//!
//! Commands:
//! - `process` — Apply the newest message's commands and embed its state
//! - `reload`  — Reinitialize the canonical state from the chat's blocks
//! - `swipe`   — Switch swipes and reload the swiped message's state
//! - `edit`    — Edit a message and reload state
//! - `inspect` — Show an embedded state
//! - `parse`   — List the commands found in a text
//! - `config`  — Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sam_config::SamConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "sam",
    about = "SAM — situational awareness manager for narrative chats",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.sam/config.toml
    #[arg(long, global = true, env = "SAM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a finished generation: apply commands and embed the new state
    Process {
        /// Chat file
        chat: PathBuf,

        /// Process this message instead of the newest one
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Reload the canonical state from the chat's embedded blocks
    Reload {
        /// Chat file
        chat: PathBuf,

        /// Start the scan at this message instead of the newest generated one
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Handle a swipe, optionally switching the active swipe first
    Swipe {
        /// Chat file
        chat: PathBuf,

        /// Swiped message (defaults to the newest)
        #[arg(short, long)]
        index: Option<usize>,

        /// Make this swipe active before reloading
        #[arg(long)]
        to: Option<usize>,
    },

    /// Handle an edit, optionally replacing the message text first
    Edit {
        /// Chat file
        chat: PathBuf,

        /// Edited message (defaults to the newest)
        #[arg(short, long)]
        index: Option<usize>,

        /// New text for the message
        #[arg(long)]
        text: Option<String>,
    },

    /// Print an embedded state (the latest one by default)
    Inspect {
        /// Chat file
        chat: PathBuf,

        /// Read the block of this message only
        #[arg(short, long)]
        index: Option<usize>,

        /// Print the canonical variable store instead
        #[arg(long, conflicts_with = "index")]
        canonical: bool,
    },

    /// List the commands in a text file (`-` for stdin)
    Parse {
        /// Input file
        input: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SamConfig::load_with_env(path)?,
        None => SamConfig::load()?,
    };

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { config.log.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Process { chat, index } => commands::chat::process(&chat, index, &config).await?,
        Commands::Reload { chat, index } => commands::chat::reload(&chat, index, &config).await?,
        Commands::Swipe { chat, index, to } => commands::chat::swipe(&chat, index, to, &config).await?,
        Commands::Edit { chat, index, text } => commands::chat::edit(&chat, index, text, &config).await?,
        Commands::Inspect {
            chat,
            index,
            canonical,
        } => commands::inspect::run(&chat, index, canonical).await?,
        Commands::Parse { input } => commands::parse::run(&input)?,
        Commands::Config => commands::config_cmd::show(&config)?,
    }

    Ok(())
}
