//! Capacity command - how much a cover image can carry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use stegdrop::crypto::symmetric::MIN_CIPHERTEXT_LEN;
use stegdrop::stego::{max_payload_for_bits, CoverImage};
use stegdrop::Config;

use super::CommandExecutor;

/// Show how many bytes of message a cover image can hide.
#[derive(Args, Debug)]
pub struct CapacityCommand {
    /// Cover image (PNG or BMP)
    #[arg(short, long)]
    pub cover: PathBuf,

    /// Payload ceiling to apply (defaults to the configured one)
    #[arg(long)]
    pub max_payload: Option<usize>,
}

impl CommandExecutor for CapacityCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        let cover = CoverImage::from_file(&self.cover)
            .with_context(|| format!("Failed to load cover image {}", self.cover.display()))?;

        let ceiling = self.max_payload.unwrap_or(config.max_payload_bytes);
        let (width, height) = cover.dimensions();
        let payload = max_payload_for_bits(cover.capacity_bits()).min(ceiling);
        let plaintext = payload.saturating_sub(MIN_CIPHERTEXT_LEN);

        println!("Cover: {} ({}x{})", self.cover.display(), width, height);
        println!("  Capacity:        {} bits", cover.capacity_bits());
        println!("  Max payload:     {} bytes (ceiling {})", payload, ceiling);
        println!("  Max message:     {} bytes of UTF-8", plaintext);

        Ok(())
    }
}
