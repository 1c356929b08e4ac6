//! Purge command - drop viewed messages.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Args;

use stegdrop::Config;

use super::{open_postbox, CommandExecutor};

/// Delete viewed messages and their leftover artifacts.
#[derive(Args, Debug)]
pub struct PurgeCommand {
    /// Only purge messages viewed more than this many hours ago
    #[arg(long, default_value = "0")]
    pub older_than_hours: u32,
}

impl CommandExecutor for PurgeCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;
        let cutoff = Utc::now() - Duration::hours(i64::from(self.older_than_hours));
        let purged = postbox
            .purge_viewed(cutoff)
            .context("Failed to purge viewed messages")?;

        println!("Purged {} viewed message(s).", purged);
        Ok(())
    }
}
