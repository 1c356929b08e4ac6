//! Inbox and outbox listings.

use anyhow::{Context, Result};
use clap::Args;

use stegdrop::{Config, InboxEntry, UserId};

use super::{open_postbox, CommandExecutor};

/// List messages sent to you.
#[derive(Args, Debug)]
pub struct InboxCommand {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,
}

/// List messages you have sent.
#[derive(Args, Debug)]
pub struct OutboxCommand {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,
}

impl CommandExecutor for InboxCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;
        let entries = postbox
            .inbox(&UserId::new(&self.user))
            .context("Failed to list inbox")?;
        print_entries(&entries, |e| format!("from {}", e.sender));
        Ok(())
    }
}

impl CommandExecutor for OutboxCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;
        let entries = postbox
            .outbox(&UserId::new(&self.user))
            .context("Failed to list outbox")?;
        print_entries(&entries, |e| format!("to {}", e.recipient));
        Ok(())
    }
}

fn print_entries<F>(entries: &[InboxEntry], party: F)
where
    F: Fn(&InboxEntry) -> String,
{
    if entries.is_empty() {
        println!("No messages.");
        return;
    }

    for entry in entries {
        println!(
            "{}  {:<24}  {}  {}",
            entry.message_id,
            party(entry),
            entry.created_at.format("%Y-%m-%d %H:%M"),
            if entry.viewed { "viewed" } else { "unread" }
        );
    }
}
