//! Pairing: two users agree on a secret code before exchanging messages.
//!
//! The requester picks the code. The other user accepts by entering the same
//! code, which is checked against the stored commitment. Every message sent
//! between them afterwards carries a copy of that commitment.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::SecretCommitment;
use crate::ids::{PairingId, UserId};
use crate::postbox::Postbox;
use crate::store::{Pairing, PairingStatus, StoreError};

/// Errors that can occur while managing pairings.
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Secret code must not be empty")]
    EmptyCode,

    #[error("Cannot pair with yourself")]
    SelfPairing,

    #[error("Already paired with {0}")]
    AlreadyPaired(UserId),

    #[error("A pairing request with {0} is already pending")]
    RequestExists(UserId),

    #[error("Pairing not found: {0}")]
    NotFound(PairingId),

    #[error("Not authorized for this pairing")]
    NotAuthorized,

    #[error("Invalid secret code")]
    InvalidCode,

    #[error("Pairing is not pending")]
    NotPending,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Postbox {
    /// Asks `recipient` to pair with `requester` under `code`.
    pub fn request_pairing(
        &self,
        requester: &UserId,
        recipient: &UserId,
        code: &str,
    ) -> Result<Pairing, PairingError> {
        if code.trim().is_empty() {
            return Err(PairingError::EmptyCode);
        }
        if requester == recipient {
            return Err(PairingError::SelfPairing);
        }

        let pairing = Pairing {
            id: PairingId::generate(),
            requester: requester.clone(),
            recipient: recipient.clone(),
            status: PairingStatus::Pending,
            secret_commitment: SecretCommitment::commit(code),
            created_at: Utc::now(),
            accepted_at: None,
        };

        // The store rejects a second pairing for the same two users in one step
        match self.store.insert_pairing(&pairing) {
            Ok(()) => {}
            Err(StoreError::PairingExists(existing)) => {
                return Err(match existing.status {
                    PairingStatus::Paired => PairingError::AlreadyPaired(recipient.clone()),
                    PairingStatus::Pending => PairingError::RequestExists(recipient.clone()),
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(pairing_id = %pairing.id, requester = %requester, recipient = %recipient, "Pairing requested");
        Ok(pairing)
    }

    /// Accepts a pending request addressed to `caller` if `code` matches.
    pub fn accept_pairing(
        &self,
        id: &PairingId,
        caller: &UserId,
        code: &str,
    ) -> Result<Pairing, PairingError> {
        let mut pairing = self.pending_for(id, caller)?;

        if !pairing.secret_commitment.verify(code) {
            warn!(pairing_id = %id, "Pairing acceptance rejected: code mismatch");
            return Err(PairingError::InvalidCode);
        }

        pairing.status = PairingStatus::Paired;
        pairing.accepted_at = Some(Utc::now());
        self.store.update_pairing(&pairing)?;

        info!(pairing_id = %id, "Pairing accepted");
        Ok(pairing)
    }

    /// Declines a pending request addressed to `caller`.
    pub fn reject_pairing(&self, id: &PairingId, caller: &UserId) -> Result<(), PairingError> {
        self.pending_for(id, caller)?;
        self.store.delete_pairing(id)?;
        info!(pairing_id = %id, "Pairing rejected");
        Ok(())
    }

    /// Users `user` is paired with.
    pub fn partners(&self, user: &UserId) -> Result<Vec<UserId>, PairingError> {
        Ok(self
            .store
            .pairings_for(user)?
            .iter()
            .filter(|p| p.status == PairingStatus::Paired)
            .filter_map(|p| p.partner_of(user).cloned())
            .collect())
    }

    /// Pending requests waiting for `user` to answer.
    pub fn incoming_requests(&self, user: &UserId) -> Result<Vec<Pairing>, PairingError> {
        Ok(self
            .store
            .pairings_for(user)?
            .into_iter()
            .filter(|p| p.status == PairingStatus::Pending && &p.recipient == user)
            .collect())
    }

    /// The established pairing between two users, if any.
    pub(crate) fn active_pairing(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<Pairing>, StoreError> {
        Ok(self
            .store
            .pairing_between(a, b)?
            .filter(|p| p.status == PairingStatus::Paired))
    }

    fn pending_for(&self, id: &PairingId, caller: &UserId) -> Result<Pairing, PairingError> {
        let pairing = self
            .store
            .get_pairing(id)?
            .ok_or_else(|| PairingError::NotFound(id.clone()))?;

        if &pairing.recipient != caller {
            return Err(PairingError::NotAuthorized);
        }
        if pairing.status != PairingStatus::Pending {
            return Err(PairingError::NotPending);
        }
        Ok(pairing)
    }
}
