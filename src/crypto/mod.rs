//! Cryptographic operations for stegdrop.
//!
//! This module provides:
//! - Message key generation and persistence ([`keys`])
//! - Authenticated symmetric encryption (HKDF + ChaCha20Poly1305, [`symmetric`])
//! - Secret code commitments gating decryption ([`commitment`])
//! - Single-use access tokens and their lookup hashes ([`token`])

pub mod commitment;
pub mod keys;
pub mod symmetric;
pub mod token;

pub use commitment::{commit, verify, SecretCommitment};
pub use keys::{resolve_key, KeyError, KeyOrigin, MessageKey, KEY_ENV_VAR, KEY_SIZE};
pub use symmetric::{decrypt, encrypt, SymmetricError};
pub use token::{AccessToken, TokenHash, TOKEN_BYTES};

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
