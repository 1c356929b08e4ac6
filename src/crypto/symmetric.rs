//! Authenticated symmetric encryption of message plaintext.
//!
//! Uses:
//! - HKDF-SHA256 to derive the cipher key from the long-lived [`MessageKey`]
//! - ChaCha20-Poly1305 for authenticated encryption
//!
//! The output is self-contained so it can be framed directly:
//! `version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)`

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::keys::{MessageKey, KEY_SIZE};

/// HKDF info string for the message cipher key.
const HKDF_INFO: &[u8] = b"STEGDROP-V1-MESSAGE";

/// Salt for HKDF (fixed so the same message key always yields the same cipher key).
const HKDF_SALT: &[u8] = b"STEGDROP-V1-SALT";

/// Leading format byte of every ciphertext.
const FORMAT_VERSION: u8 = 1;

/// Nonce size for ChaCha20Poly1305.
const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Smallest well-formed ciphertext (empty plaintext).
pub const MIN_CIPHERTEXT_LEN: usize = 1 + NONCE_SIZE + TAG_SIZE;

/// Errors that can occur during symmetric encryption.
#[derive(Error, Debug)]
pub enum SymmetricError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

/// Derives the cipher key from the message key.
fn derive_cipher_key(key: &MessageKey) -> Result<Zeroizing<[u8; KEY_SIZE]>, SymmetricError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), key.as_bytes());
    let mut cipher_key = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(HKDF_INFO, &mut cipher_key[..])
        .map_err(|_| SymmetricError::KeyDerivationFailed)?;
    Ok(cipher_key)
}

/// Size of the ciphertext produced for a plaintext of `plaintext_len` bytes.
pub fn ciphertext_len(plaintext_len: usize) -> usize {
    MIN_CIPHERTEXT_LEN + plaintext_len
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &MessageKey, plaintext: &[u8]) -> Result<Vec<u8>, SymmetricError> {
    let cipher_key = derive_cipher_key(key)?;

    // Generate random nonce
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&cipher_key[..])
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(1 + NONCE_SIZE + sealed.len());
    result.push(FORMAT_VERSION);
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&sealed);

    Ok(result)
}

/// Decrypts data produced by [`encrypt`].
///
/// Fails closed: a wrong version byte, short input, wrong key or tampered
/// byte all yield [`SymmetricError::DecryptionFailed`] and no plaintext.
pub fn decrypt(key: &MessageKey, data: &[u8]) -> Result<Vec<u8>, SymmetricError> {
    if data.len() < MIN_CIPHERTEXT_LEN {
        return Err(SymmetricError::DecryptionFailed(
            "ciphertext too short".to_string(),
        ));
    }
    if data[0] != FORMAT_VERSION {
        return Err(SymmetricError::DecryptionFailed(format!(
            "unsupported format version {}",
            data[0]
        )));
    }

    let nonce = Nonce::from_slice(&data[1..1 + NONCE_SIZE]);
    let sealed = &data[1 + NONCE_SIZE..];

    let cipher_key = derive_cipher_key(key)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&cipher_key[..])
        .map_err(|e| SymmetricError::DecryptionFailed(e.to_string()))?;

    cipher
        .decrypt(nonce, sealed)
        .map_err(|_| SymmetricError::DecryptionFailed("authentication failed".to_string()))
}
