//! Single-view reveal.
//!
//! A message moves through `CREATED -> CODE_PENDING -> VIEWED`. Opening the
//! link ([`Postbox::inspect`]) checks the token and the caller without
//! consuming anything. [`Postbox::reveal`] additionally checks the secret
//! code, then claims the message with the store's atomic test-and-set before
//! any decryption happens. Once claimed, the message is consumed even if
//! extraction or decryption later fails.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::{decrypt, SymmetricError, TokenHash};
use crate::ids::{MessageId, UserId};
use crate::postbox::Postbox;
use crate::stego::{extract_payload, CoverImage};
use crate::store::{MessageRecord, StoreError};

/// Errors a reveal can end with.
#[derive(Error, Debug)]
pub enum RevealError {
    #[error("Message not found")]
    NotFound,

    #[error("Not the recipient of this message")]
    NotAuthorized,

    #[error("Secret code required")]
    CodeRequired,

    #[error("Invalid secret code")]
    InvalidCode,

    #[error("Message already viewed")]
    AlreadyViewed,

    #[error("Failed to extract hidden payload: {0}")]
    ExtractionFailed(String),

    #[error(transparent)]
    DecryptionFailed(#[from] SymmetricError),

    #[error("Service unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Coarse outcome class for a transport layer to map onto its own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    NotFound,
    Forbidden,
    Gone,
    ServerError,
    Unavailable,
}

impl StatusClass {
    /// The matching HTTP status code.
    pub fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::Gone => 410,
            Self::ServerError => 500,
            Self::Unavailable => 503,
        }
    }
}

impl RevealError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::NotFound => StatusClass::NotFound,
            Self::NotAuthorized | Self::CodeRequired | Self::InvalidCode => StatusClass::Forbidden,
            Self::AlreadyViewed => StatusClass::Gone,
            Self::ExtractionFailed(_) | Self::DecryptionFailed(_) => StatusClass::ServerError,
            Self::Unavailable(_) => StatusClass::Unavailable,
        }
    }

    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAuthorized => "not_authorized",
            Self::CodeRequired => "code_required",
            Self::InvalidCode => "invalid_code",
            Self::AlreadyViewed => "already_viewed",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::DecryptionFailed(_) => "decryption_failed",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// A successfully revealed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revealed {
    pub plaintext: String,
    /// Always true: the message cannot be revealed again.
    pub single_view: bool,
    /// How long the client should keep the plaintext on screen.
    pub view_seconds: u64,
}

/// What the recipient sees after opening a link, before entering the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReveal {
    pub message_id: MessageId,
    pub sender: UserId,
    pub created_at: DateTime<Utc>,
}

impl Postbox {
    /// Checks that `token` names an unviewed message addressed to `caller`.
    ///
    /// `caller` is `None` for an unauthenticated request.
    pub fn inspect(
        &self,
        token: &str,
        caller: Option<&UserId>,
    ) -> Result<PendingReveal, RevealError> {
        let record = self.authorize(token, caller)?;
        Ok(PendingReveal {
            message_id: record.message_id,
            sender: record.sender,
            created_at: record.created_at,
        })
    }

    /// Reveals the message behind `token` to `caller`, consuming it.
    pub fn reveal(
        &self,
        token: &str,
        caller: Option<&UserId>,
        code: Option<&str>,
    ) -> Result<Revealed, RevealError> {
        let record = self.authorize(token, caller)?;

        let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => return Err(rejected(&record.message_id, RevealError::CodeRequired)),
        };
        if !record.secret_commitment.verify(code) {
            return Err(rejected(&record.message_id, RevealError::InvalidCode));
        }

        if !self.store.try_mark_viewed(&record.message_id, Utc::now())? {
            return Err(rejected(&record.message_id, RevealError::AlreadyViewed));
        }

        // From here on the message is consumed whatever happens.
        let result = self.open_artifact(&record);
        self.discard_artifact(&record);

        let plaintext = result.map_err(|e| {
            warn!(message_id = %record.message_id, reason = e.kind(), "Reveal failed after consumption");
            e
        })?;

        info!(message_id = %record.message_id, recipient = %record.recipient, "Message revealed");
        Ok(Revealed {
            plaintext,
            single_view: true,
            view_seconds: self.view_seconds,
        })
    }

    /// Lookup, recipient and viewed checks shared by inspect and reveal.
    fn authorize(
        &self,
        token: &str,
        caller: Option<&UserId>,
    ) -> Result<MessageRecord, RevealError> {
        let record = self
            .store
            .lookup_by_token_hash(&TokenHash::of(token))?
            .ok_or(RevealError::NotFound)?;

        if caller != Some(&record.recipient) {
            return Err(rejected(&record.message_id, RevealError::NotAuthorized));
        }
        if record.viewed {
            return Err(rejected(&record.message_id, RevealError::AlreadyViewed));
        }
        Ok(record)
    }

    fn open_artifact(&self, record: &MessageRecord) -> Result<String, RevealError> {
        let png = self
            .artifacts
            .get(&record.artifact_ref)
            .map_err(|e| RevealError::ExtractionFailed(e.to_string()))?;
        let stego =
            CoverImage::from_bytes(&png).map_err(|e| RevealError::ExtractionFailed(e.to_string()))?;
        let ciphertext = extract_payload(&stego, self.max_payload_bytes)
            .map_err(|e| RevealError::ExtractionFailed(e.to_string()))?;

        let plaintext = decrypt(&self.key, &ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| {
            RevealError::DecryptionFailed(SymmetricError::DecryptionFailed(
                "plaintext is not valid UTF-8".to_string(),
            ))
        })
    }

    fn discard_artifact(&self, record: &MessageRecord) {
        if let Err(e) = self.artifacts.delete(&record.artifact_ref) {
            warn!(message_id = %record.message_id, error = %e, "Failed to delete artifact after reveal");
        }
    }
}

fn rejected(message_id: &MessageId, error: RevealError) -> RevealError {
    warn!(message_id = %message_id, reason = error.kind(), "Reveal rejected");
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AccessToken;
    use crate::postbox::testing::{cover_png, harness, pair, Harness};
    use crate::send::SendReceipt;
    use crate::store::{ArtifactStore, MessageStore};

    fn sent(h: &Harness, text: &str) -> SendReceipt {
        pair(&h.postbox, "alice", "bob", "kiwi");
        h.postbox
            .send(&"alice".into(), &"bob".into(), &cover_png(48, 48), text)
            .unwrap()
    }

    fn is_viewed(h: &Harness, receipt: &SendReceipt) -> bool {
        h.store
            .get_message(&receipt.message_id)
            .unwrap()
            .unwrap()
            .viewed
    }

    #[test]
    fn test_reveal_success() {
        let h = harness();
        let receipt = sent(&h, "the eagle lands at noon");

        let revealed = h
            .postbox
            .reveal(receipt.token.as_str(), Some(&"bob".into()), Some("kiwi"))
            .unwrap();
        assert_eq!(revealed.plaintext, "the eagle lands at noon");
        assert!(revealed.single_view);
        assert_eq!(revealed.view_seconds, 10);

        assert!(is_viewed(&h, &receipt));
        assert!(h.artifacts.is_empty());

        let again = h
            .postbox
            .reveal(receipt.token.as_str(), Some(&"bob".into()), Some("kiwi"));
        assert!(matches!(again, Err(RevealError::AlreadyViewed)));
    }

    #[test]
    fn test_inspect_does_not_consume() {
        let h = harness();
        let receipt = sent(&h, "peek");

        let pending = h.postbox.inspect(receipt.token.as_str(), Some(&"bob".into())).unwrap();
        assert_eq!(pending.message_id, receipt.message_id);
        assert_eq!(pending.sender, UserId::new("alice"));
        assert!(!is_viewed(&h, &receipt));

        assert!(matches!(
            h.postbox.inspect(receipt.token.as_str(), Some(&"carol".into())),
            Err(RevealError::NotAuthorized)
        ));
        assert!(matches!(
            h.postbox.inspect(receipt.token.as_str(), None),
            Err(RevealError::NotAuthorized)
        ));
    }

    #[test]
    fn test_check_order() {
        let h = harness();
        let receipt = sent(&h, "ordered");
        let token = receipt.token.as_str();

        assert!(matches!(
            h.postbox.reveal(AccessToken::generate().as_str(), Some(&"bob".into()), Some("kiwi")),
            Err(RevealError::NotFound)
        ));
        // Wrong caller is reported before a missing or wrong code
        assert!(matches!(
            h.postbox.reveal(token, Some(&"alice".into()), None),
            Err(RevealError::NotAuthorized)
        ));
        assert!(matches!(
            h.postbox.reveal(token, Some(&"bob".into()), None),
            Err(RevealError::CodeRequired)
        ));
        assert!(matches!(
            h.postbox.reveal(token, Some(&"bob".into()), Some("  ")),
            Err(RevealError::CodeRequired)
        ));
        assert!(matches!(
            h.postbox.reveal(token, Some(&"bob".into()), Some("plum")),
            Err(RevealError::InvalidCode)
        ));
        assert!(!is_viewed(&h, &receipt));

        h.postbox.reveal(token, Some(&"bob".into()), Some("kiwi")).unwrap();
        // Viewed is reported before the code is looked at
        assert!(matches!(
            h.postbox.reveal(token, Some(&"bob".into()), None),
            Err(RevealError::AlreadyViewed)
        ));
    }

    #[test]
    fn test_corrupted_artifact_is_extraction_failure() {
        let h = harness();
        let receipt = sent(&h, "fragile");
        let record = h.store.get_message(&receipt.message_id).unwrap().unwrap();
        h.artifacts
            .overwrite(&record.artifact_ref, cover_png(48, 48))
            .unwrap();

        let result = h
            .postbox
            .reveal(receipt.token.as_str(), Some(&"bob".into()), Some("kiwi"));
        assert!(matches!(result, Err(RevealError::ExtractionFailed(_))));
        assert_eq!(result.unwrap_err().status_class(), StatusClass::ServerError);
        // Consumed all the same
        assert!(is_viewed(&h, &receipt));
    }

    #[test]
    fn test_missing_artifact_is_extraction_failure() {
        let h = harness();
        let receipt = sent(&h, "gone");
        let record = h.store.get_message(&receipt.message_id).unwrap().unwrap();
        h.artifacts.delete(&record.artifact_ref).unwrap();

        assert!(matches!(
            h.postbox.reveal(receipt.token.as_str(), Some(&"bob".into()), Some("kiwi")),
            Err(RevealError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(RevealError::NotFound.status_class().http_status(), 404);
        assert_eq!(RevealError::NotAuthorized.status_class(), StatusClass::Forbidden);
        assert_eq!(RevealError::CodeRequired.status_class(), StatusClass::Forbidden);
        assert_eq!(RevealError::InvalidCode.status_class(), StatusClass::Forbidden);
        assert_eq!(RevealError::AlreadyViewed.status_class().http_status(), 410);
        assert_eq!(
            RevealError::DecryptionFailed(SymmetricError::KeyDerivationFailed).status_class(),
            StatusClass::ServerError
        );
        assert_eq!(
            RevealError::Unavailable(StoreError::Unavailable("down".into()))
                .status_class()
                .http_status(),
            503
        );
    }
}
