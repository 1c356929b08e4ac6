//! In-process store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{MessageRecord, MessageStore, Pairing, Result, StoreError};
use crate::crypto::TokenHash;
use crate::ids::{MessageId, PairingId, UserId};

#[derive(Default)]
struct State {
    messages: HashMap<MessageId, MessageRecord>,
    token_index: HashMap<TokenHash, MessageId>,
    pairings: HashMap<PairingId, Pairing>,
}

/// A [`MessageStore`] held in memory behind a single mutex.
///
/// Every check-then-write runs under one guard.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn newest_first(mut records: Vec<MessageRecord>) -> Vec<MessageRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

impl MessageStore for MemoryStore {
    fn insert_message(&self, record: &MessageRecord) -> Result<()> {
        let mut state = self.lock()?;
        if state.messages.contains_key(&record.message_id)
            || state.token_index.contains_key(&record.token_hash)
        {
            return Err(StoreError::Duplicate(record.message_id.to_string()));
        }
        state
            .token_index
            .insert(record.token_hash.clone(), record.message_id.clone());
        state
            .messages
            .insert(record.message_id.clone(), record.clone());
        Ok(())
    }

    fn lookup_by_token_hash(&self, hash: &TokenHash) -> Result<Option<MessageRecord>> {
        let state = self.lock()?;
        Ok(state
            .token_index
            .get(hash)
            .and_then(|id| state.messages.get(id))
            .cloned())
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<MessageRecord>> {
        Ok(self.lock()?.messages.get(id).cloned())
    }

    fn try_mark_viewed(&self, id: &MessageId, viewed_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.lock()?;
        match state.messages.get_mut(id) {
            Some(record) if !record.viewed => {
                record.viewed = true;
                record.viewed_at = Some(viewed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn messages_for_recipient(&self, recipient: &UserId) -> Result<Vec<MessageRecord>> {
        let state = self.lock()?;
        Ok(newest_first(
            state
                .messages
                .values()
                .filter(|m| &m.recipient == recipient)
                .cloned()
                .collect(),
        ))
    }

    fn messages_from_sender(&self, sender: &UserId) -> Result<Vec<MessageRecord>> {
        let state = self.lock()?;
        Ok(newest_first(
            state
                .messages
                .values()
                .filter(|m| &m.sender == sender)
                .cloned()
                .collect(),
        ))
    }

    fn viewed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageRecord>> {
        let state = self.lock()?;
        Ok(state
            .messages
            .values()
            .filter(|m| m.viewed && m.viewed_at.map_or(false, |at| at < cutoff))
            .cloned()
            .collect())
    }

    fn delete_message(&self, id: &MessageId) -> Result<bool> {
        let mut state = self.lock()?;
        match state.messages.remove(id) {
            Some(record) => {
                state.token_index.remove(&record.token_hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_pairing(&self, pairing: &Pairing) -> Result<()> {
        let mut state = self.lock()?;
        if state.pairings.contains_key(&pairing.id) {
            return Err(StoreError::Duplicate(pairing.id.to_string()));
        }
        if let Some(existing) = state
            .pairings
            .values()
            .find(|p| p.joins(&pairing.requester, &pairing.recipient))
        {
            return Err(StoreError::PairingExists(Box::new(existing.clone())));
        }
        state.pairings.insert(pairing.id.clone(), pairing.clone());
        Ok(())
    }

    fn get_pairing(&self, id: &PairingId) -> Result<Option<Pairing>> {
        Ok(self.lock()?.pairings.get(id).cloned())
    }

    fn pairing_between(&self, a: &UserId, b: &UserId) -> Result<Option<Pairing>> {
        let state = self.lock()?;
        Ok(state.pairings.values().find(|p| p.joins(a, b)).cloned())
    }

    fn pairings_for(&self, user: &UserId) -> Result<Vec<Pairing>> {
        let state = self.lock()?;
        let mut pairings: Vec<Pairing> = state
            .pairings
            .values()
            .filter(|p| p.involves(user))
            .cloned()
            .collect();
        pairings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pairings)
    }

    fn update_pairing(&self, pairing: &Pairing) -> Result<()> {
        let mut state = self.lock()?;
        match state.pairings.get_mut(&pairing.id) {
            Some(existing) => {
                *existing = pairing.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!(
                "pairing {} does not exist",
                pairing.id
            ))),
        }
    }

    fn delete_pairing(&self, id: &PairingId) -> Result<bool> {
        Ok(self.lock()?.pairings.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    #[test]
    fn test_memory_store_contract() {
        fixtures::exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_concurrent_mark_viewed_single_winner() {
        let store = MemoryStore::new();
        let (record, _) = fixtures::message("alice", "bob");
        store.insert_message(&record).unwrap();

        let barrier = Barrier::new(8);
        let winners = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    if store.try_mark_viewed(&record.message_id, Utc::now()).unwrap() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
