//! Send command.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use stegdrop::{Config, UserId};

use super::{open_postbox, CommandExecutor};

/// Hide a message in a cover image and print its one-time token.
#[derive(Args, Debug)]
pub struct SendCommand {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// Recipient (must be paired with you)
    #[arg(long)]
    pub to: String,

    /// Cover image (PNG or BMP)
    #[arg(short, long)]
    pub cover: PathBuf,

    /// Message text (reads from stdin if not provided)
    #[arg(short, long)]
    pub message: Option<String>,
}

impl CommandExecutor for SendCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let message = match &self.message {
            Some(m) => m.clone(),
            None => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read message from stdin")?;
                buf
            }
        };
        if message.trim().is_empty() {
            bail!("Message is empty");
        }

        let cover = fs::read(&self.cover)
            .with_context(|| format!("Failed to read cover image {}", self.cover.display()))?;

        let postbox = open_postbox(config)?;
        let receipt = postbox
            .send(&UserId::new(&self.user), &UserId::new(&self.to), &cover, &message)
            .context("Failed to send message")?;

        println!("Message sent to {}.", UserId::new(&self.to));
        println!("  Message id: {}", receipt.message_id);
        println!("  Token:      {}", receipt.token);
        println!();
        println!("The token is shown only once. Deliver it to the recipient.");

        Ok(())
    }
}
