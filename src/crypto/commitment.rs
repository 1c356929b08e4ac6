//! Secret code commitments.
//!
//! Paired users agree on a human-chosen secret code. Only its SHA-256 digest
//! is stored: once on the pairing, and copied into every message sent under
//! that pairing. The gate is independent of the message key and the access
//! token.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::sha256_hex;

/// Hex SHA-256 digest of a secret code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretCommitment(String);

impl SecretCommitment {
    /// Commits to `code`. Surrounding whitespace is ignored.
    pub fn commit(code: &str) -> Self {
        Self(sha256_hex(code.trim().as_bytes()))
    }

    /// Returns true if `code` hashes to this commitment.
    pub fn verify(&self, code: &str) -> bool {
        let candidate = Self::commit(code);
        candidate.0.as_bytes().ct_eq(self.0.as_bytes()).into()
    }

    /// Wraps a stored hex digest.
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Commits to a secret code.
pub fn commit(code: &str) -> SecretCommitment {
    SecretCommitment::commit(code)
}

/// Checks a secret code against a commitment.
pub fn verify(code: &str, commitment: &SecretCommitment) -> bool {
    commitment.verify(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_is_deterministic() {
        assert_eq!(commit("kiwi"), commit("kiwi"));
        assert_eq!(commit("kiwi").as_str().len(), 64);
    }

    #[test]
    fn test_verify() {
        let commitment = commit("kiwi");
        assert!(verify("kiwi", &commitment));
        assert!(!verify("Kiwi", &commitment));
        assert!(!verify("", &commitment));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let commitment = commit("  kiwi\n");
        assert!(verify("kiwi", &commitment));
    }

    #[test]
    fn test_matches_plain_sha256() {
        assert_eq!(
            commit("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_stored_digest_roundtrip() {
        let stored = commit("mango").as_str().to_string();
        assert!(SecretCommitment::from_hex(stored).verify("mango"));
    }
}
