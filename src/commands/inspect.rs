//! Inspect command - check a token without consuming the message.

use anyhow::{Context, Result};
use clap::Args;

use stegdrop::{Config, UserId};

use super::{open_postbox, CommandExecutor};

/// Check that a token is valid for you without revealing the message.
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// Access token from the sender
    #[arg(long)]
    pub token: String,
}

impl CommandExecutor for InspectCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;
        let pending = postbox
            .inspect(&self.token, Some(&UserId::new(&self.user)))
            .context("Token check failed")?;

        println!("Message {} from {}", pending.message_id, pending.sender);
        println!("  Sent: {}", pending.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!();
        println!("Enter the secret code with `stegdrop reveal` to view it (single view).");

        Ok(())
    }
}
