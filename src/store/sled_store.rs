//! Persistent store backed by sled.
//!
//! Trees:
//! - `messages`: message id -> bincode [`MessageRecord`]
//! - `token_index`: token hash -> message id
//! - `pairings`: pairing id -> bincode [`Pairing`]
//! - `pair_index`: sorted user pair -> pairing id, one entry per pair

use chrono::{DateTime, Utc};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::Transactional;
use std::path::Path;

use super::{
    decode_record, encode_record, pair_key, MessageRecord, MessageStore, Pairing, Result,
    StoreError,
};
use crate::crypto::TokenHash;
use crate::ids::{MessageId, PairingId, UserId};

/// Tree name for message records.
const MESSAGES_TREE: &str = "messages";

/// Tree name for the token hash index.
const TOKEN_INDEX_TREE: &str = "token_index";

/// Tree name for pairings.
const PAIRINGS_TREE: &str = "pairings";

/// Tree name for the user pair index.
const PAIR_INDEX_TREE: &str = "pair_index";

fn db_err(context: &str, e: sled::Error) -> StoreError {
    match e {
        sled::Error::Io(io) => StoreError::Unavailable(format!("{}: {}", context, io)),
        other => StoreError::Database(format!("{}: {}", context, other)),
    }
}

/// A [`MessageStore`] persisted with sled.
pub struct SledStore {
    db: sled::Db,
    messages: sled::Tree,
    token_index: sled::Tree,
    pairings: sled::Tree,
    pair_index: sled::Tree,
}

/// Why a pairing insert was aborted.
enum PairingConflict {
    Id,
    Pair(Option<sled::IVec>),
}

fn finish<T>(
    result: std::result::Result<T, TransactionError<StoreError>>,
    context: &str,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(db_err(context, e)),
    }
}

impl SledStore {
    /// Opens (or creates) a database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| db_err("Failed to open database", e))?;
        Self::from_db(db)
    }

    /// Uses an already-open database.
    pub fn from_db(db: sled::Db) -> Result<Self> {
        let messages = db
            .open_tree(MESSAGES_TREE)
            .map_err(|e| db_err("Failed to open messages tree", e))?;
        let token_index = db
            .open_tree(TOKEN_INDEX_TREE)
            .map_err(|e| db_err("Failed to open token index tree", e))?;
        let pairings = db
            .open_tree(PAIRINGS_TREE)
            .map_err(|e| db_err("Failed to open pairings tree", e))?;
        let pair_index = db
            .open_tree(PAIR_INDEX_TREE)
            .map_err(|e| db_err("Failed to open pair index tree", e))?;

        Ok(Self {
            db,
            messages,
            token_index,
            pairings,
            pair_index,
        })
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| db_err("Failed to flush database", e))?;
        Ok(())
    }

    fn scan_messages<F>(&self, keep: F) -> Result<Vec<MessageRecord>>
    where
        F: Fn(&MessageRecord) -> bool,
    {
        let mut records = Vec::new();
        for entry in self.messages.iter() {
            let (_, value) = entry.map_err(|e| db_err("Failed to iterate messages", e))?;
            let record: MessageRecord = decode_record(&value)?;
            if keep(&record) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn scan_pairings<F>(&self, keep: F) -> Result<Vec<Pairing>>
    where
        F: Fn(&Pairing) -> bool,
    {
        let mut pairings = Vec::new();
        for entry in self.pairings.iter() {
            let (_, value) = entry.map_err(|e| db_err("Failed to iterate pairings", e))?;
            let pairing: Pairing = decode_record(&value)?;
            if keep(&pairing) {
                pairings.push(pairing);
            }
        }
        pairings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pairings)
    }
}

impl MessageStore for SledStore {
    fn insert_message(&self, record: &MessageRecord) -> Result<()> {
        let value = encode_record(record)?;
        let id = record.message_id.as_str().as_bytes();
        let token = record.token_hash.as_str().as_bytes();

        let result = (&self.messages, &self.token_index).transaction(|(messages, index)| {
            if messages.get(id)?.is_some() || index.get(token)?.is_some() {
                return Err(ConflictableTransactionError::Abort(()));
            }
            messages.insert(id, value.as_slice())?;
            index.insert(token, id)?;
            Ok::<(), ConflictableTransactionError<()>>(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(())) => {
                Err(StoreError::Duplicate(record.message_id.to_string()))
            }
            Err(TransactionError::Storage(e)) => Err(db_err("Failed to insert message", e)),
        }
    }

    fn lookup_by_token_hash(&self, hash: &TokenHash) -> Result<Option<MessageRecord>> {
        let Some(id) = self
            .token_index
            .get(hash.as_str().as_bytes())
            .map_err(|e| db_err("Failed to read token index", e))?
        else {
            return Ok(None);
        };

        self.messages
            .get(&id)
            .map_err(|e| db_err("Failed to read message", e))?
            .map(|value| decode_record(&value))
            .transpose()
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<MessageRecord>> {
        self.messages
            .get(id.as_str().as_bytes())
            .map_err(|e| db_err("Failed to read message", e))?
            .map(|value| decode_record(&value))
            .transpose()
    }

    fn try_mark_viewed(&self, id: &MessageId, viewed_at: DateTime<Utc>) -> Result<bool> {
        let key = id.as_str().as_bytes();
        loop {
            let Some(current) = self
                .messages
                .get(key)
                .map_err(|e| db_err("Failed to read message", e))?
            else {
                return Ok(false);
            };

            let mut record: MessageRecord = decode_record(&current)?;
            if record.viewed {
                return Ok(false);
            }
            record.viewed = true;
            record.viewed_at = Some(viewed_at);
            let updated = encode_record(&record)?;

            // Only succeeds if nobody changed the record since we read it.
            let swapped = self
                .messages
                .compare_and_swap(key, Some(&current), Some(updated))
                .map_err(|e| db_err("Failed to update message", e))?;

            if swapped.is_ok() {
                return Ok(true);
            }
        }
    }

    fn messages_for_recipient(&self, recipient: &UserId) -> Result<Vec<MessageRecord>> {
        self.scan_messages(|m| &m.recipient == recipient)
    }

    fn messages_from_sender(&self, sender: &UserId) -> Result<Vec<MessageRecord>> {
        self.scan_messages(|m| &m.sender == sender)
    }

    fn viewed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageRecord>> {
        self.scan_messages(|m| m.viewed && m.viewed_at.map_or(false, |at| at < cutoff))
    }

    fn delete_message(&self, id: &MessageId) -> Result<bool> {
        let key = id.as_str().as_bytes();
        let result = (&self.messages, &self.token_index).transaction(
            |(messages, index)| -> ConflictableTransactionResult<bool, StoreError> {
                let Some(value) = messages.remove(key)? else {
                    return Ok(false);
                };
                let record: MessageRecord =
                    decode_record(&value).map_err(ConflictableTransactionError::Abort)?;
                index.remove(record.token_hash.as_str().as_bytes())?;
                Ok(true)
            },
        );
        finish(result, "Failed to delete message")
    }

    fn insert_pairing(&self, pairing: &Pairing) -> Result<()> {
        let value = encode_record(pairing)?;
        let id = pairing.id.as_str().as_bytes();
        let pair = pairing.pair_key();

        let result = (&self.pairings, &self.pair_index).transaction(
            |(pairings, index)| -> ConflictableTransactionResult<(), PairingConflict> {
                if pairings.get(id)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(PairingConflict::Id));
                }
                if let Some(existing_id) = index.get(&pair)? {
                    let existing = pairings.get(&existing_id)?;
                    return Err(ConflictableTransactionError::Abort(PairingConflict::Pair(existing)));
                }
                pairings.insert(id, value.as_slice())?;
                index.insert(pair.as_slice(), id)?;
                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(PairingConflict::Id)) => {
                Err(StoreError::Duplicate(pairing.id.to_string()))
            }
            Err(TransactionError::Abort(PairingConflict::Pair(Some(existing)))) => {
                let existing: Pairing = decode_record(&existing)?;
                Err(StoreError::PairingExists(Box::new(existing)))
            }
            Err(TransactionError::Abort(PairingConflict::Pair(None))) => Err(StoreError::Database(
                format!("pair index of {} points at a missing pairing", pairing.id),
            )),
            Err(TransactionError::Storage(e)) => Err(db_err("Failed to insert pairing", e)),
        }
    }

    fn get_pairing(&self, id: &PairingId) -> Result<Option<Pairing>> {
        self.pairings
            .get(id.as_str().as_bytes())
            .map_err(|e| db_err("Failed to read pairing", e))?
            .map(|value| decode_record(&value))
            .transpose()
    }

    fn pairing_between(&self, a: &UserId, b: &UserId) -> Result<Option<Pairing>> {
        let Some(id) = self
            .pair_index
            .get(pair_key(a, b))
            .map_err(|e| db_err("Failed to read pair index", e))?
        else {
            return Ok(None);
        };

        self.pairings
            .get(&id)
            .map_err(|e| db_err("Failed to read pairing", e))?
            .map(|value| decode_record(&value))
            .transpose()
    }

    fn pairings_for(&self, user: &UserId) -> Result<Vec<Pairing>> {
        self.scan_pairings(|p| p.involves(user))
    }

    fn update_pairing(&self, pairing: &Pairing) -> Result<()> {
        let key = pairing.id.as_str().as_bytes();
        if !self
            .pairings
            .contains_key(key)
            .map_err(|e| db_err("Failed to read pairing", e))?
        {
            return Err(StoreError::Database(format!(
                "pairing {} does not exist",
                pairing.id
            )));
        }
        self.pairings
            .insert(key, encode_record(pairing)?)
            .map_err(|e| db_err("Failed to update pairing", e))?;
        Ok(())
    }

    fn delete_pairing(&self, id: &PairingId) -> Result<bool> {
        let key = id.as_str().as_bytes();
        let result = (&self.pairings, &self.pair_index).transaction(
            |(pairings, index)| -> ConflictableTransactionResult<bool, StoreError> {
                let Some(value) = pairings.remove(key)? else {
                    return Ok(false);
                };
                let pairing: Pairing =
                    decode_record(&value).map_err(ConflictableTransactionError::Abort)?;
                let pair = pairing.pair_key();
                if index.get(&pair)?.as_deref() == Some(key) {
                    index.remove(pair.as_slice())?;
                }
                Ok(true)
            },
        );
        finish(result, "Failed to delete pairing")
    }
}
