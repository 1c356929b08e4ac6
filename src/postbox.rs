//! The postbox: message key, stores and limits wired together.
//!
//! A [`Postbox`] is built once from a [`Config`] and a [`MessageKey`] and
//! handed to whatever serves requests. Pairing, sending and revealing are
//! implemented on it in their own modules.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_VIEW_SECONDS};
use crate::crypto::MessageKey;
use crate::ids::{MessageId, UserId};
use crate::stego::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::store::{
    ArtifactStore, FsArtifactStore, MessageRecord, MessageStore, SledStore, StoreError,
};

/// Summary of a message for inbox and outbox listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub message_id: MessageId,
    pub sender: UserId,
    pub recipient: UserId,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
}

impl From<&MessageRecord> for InboxEntry {
    fn from(record: &MessageRecord) -> Self {
        Self {
            message_id: record.message_id.clone(),
            sender: record.sender.clone(),
            recipient: record.recipient.clone(),
            created_at: record.created_at,
            viewed: record.viewed,
        }
    }
}

pub struct Postbox {
    pub(crate) key: MessageKey,
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) artifacts: Arc<dyn ArtifactStore>,
    pub(crate) max_payload_bytes: usize,
    pub(crate) view_seconds: u64,
}

impl Postbox {
    /// Creates a postbox over the given stores with default limits.
    pub fn new(
        key: MessageKey,
        store: Arc<dyn MessageStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            key,
            store,
            artifacts,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            view_seconds: DEFAULT_VIEW_SECONDS,
        }
    }

    /// Overrides the payload ceiling and view window.
    pub fn with_limits(mut self, max_payload_bytes: usize, view_seconds: u64) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self.view_seconds = view_seconds;
        self
    }

    /// Opens the sled database and artifact directory named in `config`.
    pub fn open(config: &Config, key: MessageKey) -> Result<Self, StoreError> {
        let store = SledStore::open(&config.data_dir)?;
        let artifacts = FsArtifactStore::new(&config.upload_dir)?;
        debug!(
            data_dir = %config.data_dir.display(),
            upload_dir = %config.upload_dir.display(),
            "Opened postbox"
        );

        Ok(Self::new(key, Arc::new(store), Arc::new(artifacts))
            .with_limits(config.max_payload_bytes, config.view_seconds))
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub fn view_seconds(&self) -> u64 {
        self.view_seconds
    }

    /// Messages addressed to `recipient`, newest first.
    pub fn inbox(&self, recipient: &UserId) -> Result<Vec<InboxEntry>, StoreError> {
        let records = self.store.messages_for_recipient(recipient)?;
        Ok(records.iter().map(InboxEntry::from).collect())
    }

    /// Messages sent by `sender`, newest first.
    pub fn outbox(&self, sender: &UserId) -> Result<Vec<InboxEntry>, StoreError> {
        let records = self.store.messages_from_sender(sender)?;
        Ok(records.iter().map(InboxEntry::from).collect())
    }

    /// Deletes viewed messages whose `viewed_at` is before `cutoff`, along
    /// with any artifact a failed reveal left behind. Returns how many
    /// records were removed.
    pub fn purge_viewed(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut purged = 0;
        for record in self.store.viewed_before(cutoff)? {
            if let Err(e) = self.artifacts.delete(&record.artifact_ref) {
                warn!(message_id = %record.message_id, error = %e, "Failed to delete artifact during purge");
            }
            if self.store.delete_message(&record.message_id)? {
                purged += 1;
            }
        }

        if purged > 0 {
            info!(count = purged, "Purged viewed messages");
        }
        Ok(purged)
    }
}
