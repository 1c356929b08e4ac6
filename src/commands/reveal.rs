//! Reveal command.

use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::json;

use stegdrop::{Config, UserId};

use super::{open_postbox, CommandExecutor};

/// Reveal a message. It cannot be revealed again afterwards.
#[derive(Args, Debug)]
pub struct RevealCommand {
    /// Your user id
    #[arg(long = "as")]
    pub user: String,

    /// Access token from the sender
    #[arg(long)]
    pub token: String,

    /// Secret code agreed during pairing
    #[arg(long)]
    pub code: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl CommandExecutor for RevealCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let postbox = open_postbox(config)?;
        let result = postbox.reveal(&self.token, Some(&UserId::new(&self.user)), self.code.as_deref());

        match result {
            Ok(revealed) => {
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&revealed)?);
                } else {
                    println!("{}", revealed.plaintext);
                    eprintln!();
                    eprintln!(
                        "Single view: this message is gone. Keep it on screen for {}s at most.",
                        revealed.view_seconds
                    );
                }
                Ok(())
            }
            Err(e) => {
                if self.json {
                    let body = json!({
                        "error": e.kind(),
                        "status": e.status_class().http_status(),
                        "message": e.to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(anyhow!(e).context("Reveal failed"))
            }
        }
    }
}
