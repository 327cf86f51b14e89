//! Blob store backed by one file per blob in a data directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hike_core::{BlobKind, BlobStore, StoreError};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the directory if needed. Fails with `Unavailable` when it cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, kind: BlobKind) -> PathBuf {
        self.dir.join(format!("{}.bin", kind.name()))
    }
}

impl BlobStore for FileStore {
    fn load(&self, kind: BlobKind) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.path(kind)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Write-then-rename so a power cut never leaves a half-written blob.
    fn save(&self, kind: BlobKind, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(kind);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.load(BlobKind::Inbox).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();
        store.save(BlobKind::Peers, &[1, 2, 3]).unwrap();
        store.save(BlobKind::Peers, &[4]).unwrap();
        assert_eq!(store.load(BlobKind::Peers).unwrap(), Some(vec![4]));
        assert!(store.dir().join("peers.bin").exists());
        assert!(!store.dir().join("peers.tmp").exists());
    }

    #[test]
    fn unusable_dir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileStore::open(file.join("sub")),
            Err(StoreError::Unavailable(_))
        ));
    }
}
