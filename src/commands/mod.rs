//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.

mod capacity;
mod inspect;
mod keygen;
mod mailbox;
mod pair;
mod purge;
mod reveal;
mod send;

pub use capacity::CapacityCommand;
pub use inspect::InspectCommand;
pub use keygen::KeygenCommand;
pub use mailbox::{InboxCommand, OutboxCommand};
pub use pair::PairCommand;
pub use purge::PurgeCommand;
pub use reveal::RevealCommand;
pub use send::SendCommand;

use anyhow::{Context, Result};
use tracing::debug;

use stegdrop::{Config, Postbox};

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self, config: &Config) -> Result<()>;
}

/// Loads the message key and opens the configured stores.
pub(crate) fn open_postbox(config: &Config) -> Result<Postbox> {
    let (key, origin) = config.message_key().context("Failed to load message key")?;
    debug!(?origin, "Message key loaded");
    Postbox::open(config, key).context("Failed to open message store")
}
