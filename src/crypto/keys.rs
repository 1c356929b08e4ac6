//! Message key generation and management.
//!
//! A single long-lived 32-byte key protects every message. It is supplied
//! out-of-band (environment variable or key file) or generated once on first
//! run and written to the configured key file. Losing the key makes every
//! message sent under it permanently unreadable.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the message key in bytes.
pub const KEY_SIZE: usize = 32;

/// Environment variable holding a base64 message key.
pub const KEY_ENV_VAR: &str = "STEGDROP_KEY";

/// PEM header for stegdrop message keys.
const KEY_HEADER: &str = "-----BEGIN STEGDROP MESSAGE KEY-----";
const KEY_FOOTER: &str = "-----END STEGDROP MESSAGE KEY-----";

/// Errors that can occur during key operations.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid PEM format: {0}")]
    InvalidPemFormat(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Key file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Where the active message key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Supplied through [`KEY_ENV_VAR`].
    Environment,
    /// Read from an existing key file.
    File,
    /// Generated on this run and written to the key file.
    Generated,
}

/// The process-wide symmetric message key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; KEY_SIZE]);

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MessageKey").field(&"[REDACTED]").finish()
    }
}

impl MessageKey {
    /// Generates a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Decodes a key from standard base64.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let mut bytes = BASE64.decode(encoded.trim())?;
        if bytes.len() != KEY_SIZE {
            let got = bytes.len();
            bytes.zeroize();
            return Err(KeyError::InvalidKeyLength {
                expected: KEY_SIZE,
                got,
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }

    /// Encodes the key as standard base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Encodes the key in PEM format.
    pub fn to_pem(&self) -> String {
        format!("{}\n{}\n{}\n", KEY_HEADER, self.to_base64(), KEY_FOOTER)
    }

    /// Decodes a key from PEM format.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let start = pem
            .find(KEY_HEADER)
            .ok_or_else(|| KeyError::InvalidPemFormat("Missing header".to_string()))?
            + KEY_HEADER.len();
        let end = pem
            .find(KEY_FOOTER)
            .ok_or_else(|| KeyError::InvalidPemFormat("Missing footer".to_string()))?;

        if start >= end {
            return Err(KeyError::InvalidPemFormat(
                "Header must come before footer".to_string(),
            ));
        }

        Self::from_base64(&pem[start..end])
    }

    /// Loads a key from a PEM file.
    pub fn load_from_file(path: &Path) -> Result<Self, KeyError> {
        let content = fs::read_to_string(path)?;
        Self::from_pem(&content)
    }

    /// Writes the key to a PEM file with owner-only permissions.
    ///
    /// The file appears at `path` fully written or not at all. Refuses to
    /// replace an existing file unless `overwrite` is set; without it the
    /// existence check and the creation are one step.
    pub fn save_to_file(&self, path: &Path, overwrite: bool) -> Result<(), KeyError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // NamedTempFile is created with mode 0600 on unix
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(self.to_pem().as_bytes())?;
        file.as_file().sync_all()?;

        let persisted = if overwrite {
            file.persist(path)
        } else {
            file.persist_noclobber(path)
        };
        match persisted {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(KeyError::AlreadyExists(path.to_path_buf()))
            }
            Err(e) => Err(e.error.into()),
        }
    }
}

/// Resolves the message key for this process.
///
/// Order: `env_value` (base64), then the key file at `path`, then a freshly
/// generated key persisted to `path`. A supplied key that fails to decode is
/// an error; it is never silently replaced.
pub fn resolve_key(env_value: Option<&str>, path: &Path) -> Result<(MessageKey, KeyOrigin), KeyError> {
    if let Some(encoded) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok((MessageKey::from_base64(encoded)?, KeyOrigin::Environment));
    }

    if path.exists() {
        return Ok((MessageKey::load_from_file(path)?, KeyOrigin::File));
    }

    let key = MessageKey::generate();
    match key.save_to_file(path, false) {
        Ok(()) => {}
        // Another process created the file first; use its key
        Err(KeyError::AlreadyExists(_)) => {
            return Ok((MessageKey::load_from_file(path)?, KeyOrigin::File));
        }
        Err(e) => return Err(e),
    }
    tracing::warn!(
        path = %path.display(),
        "generated a new message key; back it up, messages sent under it are unreadable without it"
    );
    Ok((key, KeyOrigin::Generated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_generation() {
        let k1 = MessageKey::generate();
        let k2 = MessageKey::generate();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = MessageKey::from_bytes([0x42; KEY_SIZE]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&key.to_base64()));
    }

    #[test]
    fn test_pem_roundtrip() {
        let key = MessageKey::generate();
        let pem = key.to_pem();

        assert!(pem.contains("-----BEGIN STEGDROP MESSAGE KEY-----"));
        assert!(pem.contains("-----END STEGDROP MESSAGE KEY-----"));

        let decoded = MessageKey::from_pem(&pem).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_pem_missing_header() {
        let result = MessageKey::from_pem("no key here");
        assert!(matches!(result, Err(KeyError::InvalidPemFormat(_))));
    }

    #[test]
    fn test_base64_wrong_length() {
        let short = BASE64.encode([1u8; 16]);
        let result = MessageKey::from_base64(&short);
        assert!(matches!(
            result,
            Err(KeyError::InvalidKeyLength { expected: 32, got: 16 })
        ));
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");

        MessageKey::generate().save_to_file(&path, false).unwrap();
        let result = MessageKey::generate().save_to_file(&path, false);
        assert!(matches!(result, Err(KeyError::AlreadyExists(_))));

        MessageKey::generate().save_to_file(&path, true).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");
        MessageKey::generate().save_to_file(&path, false).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_resolve_generates_then_reuses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys").join("message.key");

        let (first, origin) = resolve_key(None, &path).unwrap();
        assert_eq!(origin, KeyOrigin::Generated);
        assert!(path.exists());

        let (second, origin) = resolve_key(None, &path).unwrap();
        assert_eq!(origin, KeyOrigin::File);
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_resolve_prefers_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");
        let env_key = MessageKey::generate();

        let (key, origin) = resolve_key(Some(&env_key.to_base64()), &path).unwrap();
        assert_eq!(origin, KeyOrigin::Environment);
        assert_eq!(key.as_bytes(), env_key.as_bytes());
        assert!(!path.exists());
    }

    #[test]
    fn test_resolve_rejects_malformed_environment_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");

        let result = resolve_key(Some("not base64 at all!"), &path);
        assert!(matches!(result, Err(KeyError::Base64Error(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_first_run_agrees_on_one_key() {
        use std::sync::Barrier;

        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");
        let barrier = Barrier::new(8);

        let resolved: Vec<(MessageKey, KeyOrigin)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        resolve_key(None, &path).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let generated = resolved
            .iter()
            .filter(|(_, origin)| *origin == KeyOrigin::Generated)
            .count();
        assert_eq!(generated, 1);

        let on_disk = MessageKey::load_from_file(&path).unwrap();
        for (key, _) in &resolved {
            assert_eq!(key.as_bytes(), on_disk.as_bytes());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_keeps_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("message.key");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let key = MessageKey::generate();
        key.save_to_file(&path, true).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(MessageKey::load_from_file(&path).unwrap().as_bytes(), key.as_bytes());
    }
}
