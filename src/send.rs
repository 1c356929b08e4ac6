//! Sending: encrypt, hide in a cover image, store, hand back a token.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::{encrypt, AccessToken, SymmetricError};
use crate::ids::{MessageId, UserId};
use crate::postbox::Postbox;
use crate::stego::{embed_payload, CoverImage, StegoError};
use crate::store::{MessageRecord, StoreError};

/// Errors that can occur while sending a message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Not paired with {0}")]
    NotPaired(UserId),

    #[error(transparent)]
    Stego(#[from] StegoError),

    #[error(transparent)]
    Encryption(#[from] SymmetricError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the sender gets back. The token is shown once and never stored.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: MessageId,
    pub token: AccessToken,
}

impl Postbox {
    /// Sends `plaintext` from `sender` to `recipient`, hidden in `cover`
    /// (any lossless image format the decoder understands).
    pub fn send(
        &self,
        sender: &UserId,
        recipient: &UserId,
        cover: &[u8],
        plaintext: &str,
    ) -> Result<SendReceipt, SendError> {
        if plaintext.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let pairing = self
            .active_pairing(sender, recipient)?
            .ok_or_else(|| SendError::NotPaired(recipient.clone()))?;

        let cover = CoverImage::from_bytes(cover)?;
        let ciphertext = encrypt(&self.key, plaintext.as_bytes())?;
        let stego = embed_payload(&cover, &ciphertext, self.max_payload_bytes)?;
        let png = stego.to_png_bytes()?;

        let message_id = MessageId::generate();
        let token = AccessToken::generate();
        let artifact_ref = self.artifacts.put(&message_id, &png)?;
        debug!(message_id = %message_id, png_bytes = png.len(), "Stored stego artifact");

        let record = MessageRecord {
            message_id: message_id.clone(),
            sender: sender.clone(),
            recipient: recipient.clone(),
            artifact_ref,
            token_hash: token.hash(),
            secret_commitment: pairing.secret_commitment,
            created_at: Utc::now(),
            viewed: false,
            viewed_at: None,
        };

        if let Err(e) = self.store.insert_message(&record) {
            if let Err(cleanup) = self.artifacts.delete(&record.artifact_ref) {
                warn!(message_id = %message_id, error = %cleanup, "Failed to remove orphaned artifact");
            }
            return Err(e.into());
        }

        info!(message_id = %message_id, sender = %sender, recipient = %recipient, "Message sent");
        Ok(SendReceipt { message_id, token })
    }
}
