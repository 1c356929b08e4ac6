//! Stego image storage.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{ArtifactStore, Result, StoreError};
use crate::ids::{ArtifactRef, MessageId};

/// Writes artifacts as `stego_<message_id>.png` files in one directory.
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Uses `dir` for artifacts, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps a reference back to a path, refusing anything outside the directory.
    fn resolve(&self, artifact: &ArtifactRef) -> Result<PathBuf> {
        let path = Path::new(artifact.as_str());
        let name = path
            .file_name()
            .ok_or_else(|| StoreError::InvalidArtifactRef(artifact.to_string()))?;

        if path.parent() != Some(self.dir.as_path()) {
            return Err(StoreError::InvalidArtifactRef(artifact.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, message_id: &MessageId, png: &[u8]) -> Result<ArtifactRef> {
        let path = self.dir.join(format!("stego_{}.png", message_id));
        fs::write(&path, png)?;
        Ok(ArtifactRef::new(path.to_string_lossy().into_owned()))
    }

    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        let path = self.resolve(artifact)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::ArtifactNotFound(artifact.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn delete(&self, artifact: &ArtifactRef) -> Result<()> {
        let path = self.resolve(artifact)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Keeps artifacts in memory under `mem://<message_id>` handles.
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the bytes behind an existing handle. Returns false if absent.
    pub fn overwrite(&self, artifact: &ArtifactRef, bytes: Vec<u8>) -> Result<bool> {
        let mut blobs = self.lock()?;
        match blobs.get_mut(artifact.as_str()) {
            Some(existing) => {
                *existing = bytes;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("artifact store lock poisoned".to_string()))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, message_id: &MessageId, png: &[u8]) -> Result<ArtifactRef> {
        let handle = format!("mem://{}", message_id);
        self.lock()?.insert(handle.clone(), png.to_vec());
        Ok(ArtifactRef::new(handle))
    }

    fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        self.lock()?
            .get(artifact.as_str())
            .cloned()
            .ok_or_else(|| StoreError::ArtifactNotFound(artifact.to_string()))
    }

    fn delete(&self, artifact: &ArtifactRef) -> Result<()> {
        self.lock()?.remove(artifact.as_str());
        Ok(())
    }
}
