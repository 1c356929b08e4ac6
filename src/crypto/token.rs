//! Access tokens.
//!
//! A token is the bearer capability placed in a delivery link. The store only
//! ever sees its SHA-256 hex digest, which is used for lookup.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::sha256_hex;

/// Random bytes per access token (144 bits).
pub const TOKEN_BYTES: usize = 18;

/// A cleartext access token. Shown once to the sender, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

impl AccessToken {
    /// Generates a new URL-safe random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The token text, as it appears in a link.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lookup hash for this token.
    pub fn hash(&self) -> TokenHash {
        TokenHash::of(&self.0)
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex SHA-256 digest of an access token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Hashes a presented token string.
    pub fn of(token: &str) -> Self {
        Self(sha256_hex(token.as_bytes()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = AccessToken::generate();
        // 18 bytes -> 24 base64 characters, no padding
        assert_eq!(token.as_str().len(), 24);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(AccessToken::generate(), AccessToken::generate());
    }

    #[test]
    fn test_hash_matches_presented_string() {
        let token = AccessToken::generate();
        assert_eq!(token.hash(), TokenHash::of(token.as_str()));
        assert_ne!(token.hash().as_str(), token.as_str());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::generate();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
