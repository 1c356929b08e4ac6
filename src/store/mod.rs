//! Persistence for message records, pairings and stego artifacts.
//!
//! The reveal protocol relies on one primitive from the store:
//! [`MessageStore::try_mark_viewed`], an atomic test-and-set of the `viewed`
//! flag. Every backend must implement it as a single conditional update so
//! that, among concurrent reveals of one message, exactly one wins.
//!
//! Backends:
//! - [`SledStore`]: persistent, uses sled's compare-and-swap
//! - [`MemoryStore`]: in-process, the check and the set happen under one lock
//!
//! Artifacts (PNG stego images) live behind [`ArtifactStore`]:
//! [`FsArtifactStore`] on disk, [`MemoryArtifactStore`] in memory.

mod artifacts;
mod memory;
mod sled_store;

pub use artifacts::{FsArtifactStore, MemoryArtifactStore};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{SecretCommitment, TokenHash};
use crate::ids::{ArtifactRef, MessageId, PairingId, UserId};

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached. Callers may retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A record with this key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The two users already have a pairing, pending or established.
    #[error("Pairing already exists between {} and {}", .0.requester, .0.recipient)]
    PairingExists(Box<Pairing>),

    /// No artifact behind the given reference.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Artifact reference does not belong to this artifact store.
    #[error("Invalid artifact reference: {0}")]
    InvalidArtifactRef(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A sent message. Owns its artifact reference and token hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub sender: UserId,
    pub recipient: UserId,
    pub artifact_ref: ArtifactRef,
    pub token_hash: TokenHash,
    /// Copied from the pairing at send time.
    pub secret_commitment: SecretCommitment,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
}

/// State of a pairing between two users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingStatus {
    /// Requested, waiting for the other user to confirm the code.
    Pending,
    /// Both users confirmed the same secret code.
    Paired,
}

/// A pairing request or established pairing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub id: PairingId,
    pub requester: UserId,
    pub recipient: UserId,
    pub status: PairingStatus,
    pub secret_commitment: SecretCommitment,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Pairing {
    /// Whether `user` is one of the two parties.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.requester == user || &self.recipient == user
    }

    /// Whether this pairing joins `a` and `b`, in either direction.
    pub fn joins(&self, a: &UserId, b: &UserId) -> bool {
        (&self.requester == a && &self.recipient == b) || (&self.requester == b && &self.recipient == a)
    }

    /// Key shared by both directions of this pairing.
    pub fn pair_key(&self) -> Vec<u8> {
        pair_key(&self.requester, &self.recipient)
    }

    /// The other party, if `user` is one of them.
    pub fn partner_of(&self, user: &UserId) -> Option<&UserId> {
        if &self.requester == user {
            Some(&self.recipient)
        } else if &self.recipient == user {
            Some(&self.requester)
        } else {
            None
        }
    }
}

/// Order-independent key for the unordered pair `{a, b}`.
pub fn pair_key(a: &UserId, b: &UserId) -> Vec<u8> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut key = Vec::with_capacity(low.as_str().len() + high.as_str().len() + 1);
    key.extend_from_slice(low.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(high.as_str().as_bytes());
    key
}

/// Message and pairing persistence.
pub trait MessageStore: Send + Sync {
    /// Persists a new message record and its token-hash index entry.
    fn insert_message(&self, record: &MessageRecord) -> Result<()>;

    /// Looks up a message by the hash of its access token.
    fn lookup_by_token_hash(&self, hash: &TokenHash) -> Result<Option<MessageRecord>>;

    /// Loads a message by id.
    fn get_message(&self, id: &MessageId) -> Result<Option<MessageRecord>>;

    /// Atomically sets `viewed = true` if it was false.
    ///
    /// Returns `true` only for the single caller that performed the flip;
    /// `false` if the message was already viewed or no longer exists.
    fn try_mark_viewed(&self, id: &MessageId, viewed_at: DateTime<Utc>) -> Result<bool>;

    /// Messages addressed to `recipient`.
    fn messages_for_recipient(&self, recipient: &UserId) -> Result<Vec<MessageRecord>>;

    /// Messages sent by `sender`.
    fn messages_from_sender(&self, sender: &UserId) -> Result<Vec<MessageRecord>>;

    /// Viewed messages whose `viewed_at` is before `cutoff`.
    fn viewed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageRecord>>;

    /// Removes a message and its index entry. Returns whether it existed.
    fn delete_message(&self, id: &MessageId) -> Result<bool>;

    /// Stores a new pairing.
    ///
    /// At most one pairing may exist per pair of users, whatever its
    /// direction or status. The check and the insert are one atomic step;
    /// a conflict returns [`StoreError::PairingExists`] with the stored record.
    fn insert_pairing(&self, pairing: &Pairing) -> Result<()>;

    fn get_pairing(&self, id: &PairingId) -> Result<Option<Pairing>>;

    /// Any pairing (pending or paired) between `a` and `b`, in either direction.
    fn pairing_between(&self, a: &UserId, b: &UserId) -> Result<Option<Pairing>>;

    /// All pairings `user` takes part in.
    fn pairings_for(&self, user: &UserId) -> Result<Vec<Pairing>>;

    fn update_pairing(&self, pairing: &Pairing) -> Result<()>;

    fn delete_pairing(&self, id: &PairingId) -> Result<bool>;
}

/// Storage for encoded stego images.
pub trait ArtifactStore: Send + Sync {
    /// Stores the PNG bytes for a message and returns a handle to them.
    fn put(&self, message_id: &MessageId, png: &[u8]) -> Result<ArtifactRef>;

    /// Reads the bytes behind a handle.
    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>>;

    /// Deletes an artifact. Deleting a missing artifact is not an error.
    fn delete(&self, artifact: &ArtifactRef) -> Result<()>;
}

pub(crate) fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| StoreError::Serialization(format!("Failed to serialize record: {}", e)))
}

pub(crate) fn decode_record<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| StoreError::Serialization(format!("Failed to deserialize record: {}", e)))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::crypto::{commit, AccessToken};

    pub fn message(sender: &str, recipient: &str) -> (MessageRecord, AccessToken) {
        let token = AccessToken::generate();
        let message_id = MessageId::generate();
        let record = MessageRecord {
            artifact_ref: ArtifactRef::new(format!("mem://{}", message_id)),
            message_id,
            sender: UserId::new(sender),
            recipient: UserId::new(recipient),
            token_hash: token.hash(),
            secret_commitment: commit("kiwi"),
            created_at: Utc::now(),
            viewed: false,
            viewed_at: None,
        };
        (record, token)
    }

    pub fn pairing(requester: &str, recipient: &str, status: PairingStatus) -> Pairing {
        Pairing {
            id: PairingId::generate(),
            requester: UserId::new(requester),
            recipient: UserId::new(recipient),
            status,
            secret_commitment: commit("kiwi"),
            created_at: Utc::now(),
            accepted_at: None,
        }
    }

    /// Behaviour every [`MessageStore`] must share.
    pub fn exercise_store(store: &dyn MessageStore) {
        let (record, token) = message("alice", "bob");
        store.insert_message(&record).unwrap();

        let found = store.lookup_by_token_hash(&token.hash()).unwrap().unwrap();
        assert_eq!(found, record);
        assert!(store
            .lookup_by_token_hash(&AccessToken::generate().hash())
            .unwrap()
            .is_none());

        assert!(matches!(
            store.insert_message(&record),
            Err(StoreError::Duplicate(_))
        ));

        let now = Utc::now();
        assert!(store.try_mark_viewed(&record.message_id, now).unwrap());
        assert!(!store.try_mark_viewed(&record.message_id, now).unwrap());

        let viewed = store.get_message(&record.message_id).unwrap().unwrap();
        assert!(viewed.viewed);
        assert_eq!(viewed.viewed_at, Some(now));

        assert_eq!(store.messages_for_recipient(&UserId::new("bob")).unwrap().len(), 1);
        assert_eq!(store.messages_from_sender(&UserId::new("alice")).unwrap().len(), 1);
        assert!(store.messages_for_recipient(&UserId::new("alice")).unwrap().is_empty());

        let later = now + chrono::Duration::seconds(1);
        assert_eq!(store.viewed_before(later).unwrap().len(), 1);
        assert!(store.viewed_before(now).unwrap().is_empty());

        assert!(store.delete_message(&record.message_id).unwrap());
        assert!(!store.delete_message(&record.message_id).unwrap());
        assert!(store.lookup_by_token_hash(&token.hash()).unwrap().is_none());
        assert!(!store.try_mark_viewed(&record.message_id, now).unwrap());

        let mut pairing = pairing("alice", "bob", PairingStatus::Pending);
        store.insert_pairing(&pairing).unwrap();
        let between = store
            .pairing_between(&UserId::new("bob"), &UserId::new("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(between.id, pairing.id);

        let reversed = super::fixtures::pairing("bob", "alice", PairingStatus::Pending);
        match store.insert_pairing(&reversed) {
            Err(StoreError::PairingExists(existing)) => assert_eq!(existing.id, pairing.id),
            other => panic!("expected PairingExists, got {:?}", other),
        }
        assert!(store.get_pairing(&reversed.id).unwrap().is_none());

        pairing.status = PairingStatus::Paired;
        pairing.accepted_at = Some(Utc::now());
        store.update_pairing(&pairing).unwrap();
        assert_eq!(
            store.get_pairing(&pairing.id).unwrap().unwrap().status,
            PairingStatus::Paired
        );
        assert_eq!(store.pairings_for(&UserId::new("bob")).unwrap().len(), 1);
        assert!(store.pairings_for(&UserId::new("carol")).unwrap().is_empty());

        assert!(store.delete_pairing(&pairing.id).unwrap());
        assert!(!store.delete_pairing(&pairing.id).unwrap());
        assert!(store.get_pairing(&pairing.id).unwrap().is_none());
        assert!(store
            .pairing_between(&UserId::new("alice"), &UserId::new("bob"))
            .unwrap()
            .is_none());

        // Deleting frees the pair for a new request
        store.insert_pairing(&reversed).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_parties() {
        let pairing = fixtures::pairing("alice", "bob", PairingStatus::Paired);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let carol = UserId::new("carol");

        assert!(pairing.involves(&alice));
        assert!(!pairing.involves(&carol));
        assert!(pairing.joins(&bob, &alice));
        assert!(!pairing.joins(&alice, &carol));
        assert_eq!(pairing.partner_of(&bob), Some(&alice));
        assert_eq!(pairing.partner_of(&carol), None);
    }

    #[test]
    fn test_record_encoding_roundtrip() {
        let (record, _) = fixtures::message("alice", "bob");
        let bytes = encode_record(&record).unwrap();
        let decoded: MessageRecord = decode_record(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_pair_key_ignores_direction() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        assert_eq!(pair_key(&alice, &bob), pair_key(&bob, &alice));
        assert_ne!(pair_key(&alice, &bob), pair_key(&alice, &UserId::new("carol")));

        let pairing = fixtures::pairing("bob", "alice", PairingStatus::Pending);
        assert_eq!(pairing.pair_key(), pair_key(&alice, &bob));
    }
}
