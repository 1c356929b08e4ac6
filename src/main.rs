//! stegdrop - single-view secret messages hidden in images
//!
//! CLI front end over the stegdrop library. Every command runs against the
//! sled database and artifact directory named in the configuration.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    CapacityCommand, CommandExecutor, InboxCommand, InspectCommand, KeygenCommand, OutboxCommand,
    PairCommand, PurgeCommand, RevealCommand, SendCommand,
};
use stegdrop::Config;

/// stegdrop - single-view secret messages hidden in images
///
/// Messages are encrypted, hidden in the pixels of a cover image and
/// redeemed once with an access token plus a secret code agreed on
/// when pairing.
#[derive(Parser)]
#[command(name = "stegdrop")]
#[command(version)]
#[command(about = "Single-view secret messages hidden in images")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.stegdrop/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new message key
    Keygen(KeygenCommand),

    /// Show how much a cover image can carry
    Capacity(CapacityCommand),

    /// Manage pairings
    Pair(PairCommand),

    /// Hide a message in a cover image for a paired user
    Send(SendCommand),

    /// Check a token without consuming the message
    Inspect(InspectCommand),

    /// Reveal a message (single view)
    Reveal(RevealCommand),

    /// List messages sent to you
    Inbox(InboxCommand),

    /// List messages you have sent
    Outbox(OutboxCommand),

    /// Delete viewed messages
    Purge(PurgeCommand),
}

impl Commands {
    fn executor(&self) -> &dyn CommandExecutor {
        match self {
            Commands::Keygen(cmd) => cmd,
            Commands::Capacity(cmd) => cmd,
            Commands::Pair(cmd) => cmd,
            Commands::Send(cmd) => cmd,
            Commands::Inspect(cmd) => cmd,
            Commands::Reveal(cmd) => cmd,
            Commands::Inbox(cmd) => cmd,
            Commands::Outbox(cmd) => cmd,
            Commands::Purge(cmd) => cmd,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    cli.command.executor().execute(&config)
}
