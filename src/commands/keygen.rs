//! Key generation command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stegdrop::crypto::{MessageKey, KEY_ENV_VAR};
use stegdrop::Config;

use super::CommandExecutor;

/// Generate a new message key.
///
/// Messages sent under one key cannot be revealed with another, so replacing
/// the key makes every pending message unreadable.
#[derive(Args, Debug)]
pub struct KeygenCommand {
    /// Output path (defaults to the configured key file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,

    /// Also print the key as base64 for use in STEGDROP_KEY
    #[arg(long)]
    pub print: bool,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let path = self.output.clone().unwrap_or_else(|| config.key_file.clone());

        let key = MessageKey::generate();
        key.save_to_file(&path, self.force)
            .with_context(|| format!("Failed to save message key to {}", path.display()))?;

        println!("Message key generated successfully:");
        println!("  Key file: {}", path.display());

        if self.print {
            println!();
            println!("{}={}", KEY_ENV_VAR, key.to_base64());
        }

        println!();
        println!("Keep this key secret and back it up.");
        println!("Pending messages cannot be revealed without the key they were sent under.");

        Ok(())
    }
}
