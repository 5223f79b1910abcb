//! Image store: persists extracted image bytes under their image id.
//!
//! Files are named `{id}.{extension}` inside the configured directory, so
//! the same id always maps to the same path. Writes go through a temporary
//! file in the destination directory followed by a rename: a second save of
//! the same id replaces the first one atomically (last write wins) and a
//! crash never leaves a half-written image behind.

use crate::error::Pdf2VolumeError;
use crate::record::ImageId;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes image files into one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `dir`. The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an image with this id and extension is (or would be) stored at.
    pub fn path_for(&self, id: &ImageId, extension: &str) -> PathBuf {
        self.dir.join(format!("{id}.{extension}"))
    }

    /// Persist `bytes` for `id` and return the final file path.
    ///
    /// # Errors
    /// * [`Pdf2VolumeError::EmptyImageData`] when `bytes` is empty
    /// * [`Pdf2VolumeError::Storage`] when the directory cannot be created or written
    pub fn save(
        &self,
        id: &ImageId,
        bytes: &[u8],
        extension: &str,
    ) -> Result<PathBuf, Pdf2VolumeError> {
        if bytes.is_empty() {
            return Err(Pdf2VolumeError::EmptyImageData { id: id.to_string() });
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| Pdf2VolumeError::Storage {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.path_for(id, extension);
        let storage_err = |source| Pdf2VolumeError::Storage {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage_err)?;
        tmp.write_all(bytes).map_err(storage_err)?;
        tmp.persist(&path).map_err(|e| storage_err(e.error))?;

        debug!("Stored {} ({} bytes) at {}", id, bytes.len(), path.display());
        Ok(path)
    }

    /// Write a JSON document (e.g. the record list) next to the images.
    pub fn save_json<T: serde::Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, Pdf2VolumeError> {
        let path = self.dir.join(file_name);
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| Pdf2VolumeError::Internal(format!("serialise {file_name}: {e}")))?;

        std::fs::create_dir_all(&self.dir).map_err(|e| Pdf2VolumeError::Storage {
            path: self.dir.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| Pdf2VolumeError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(page: usize, seq: usize) -> ImageId {
        ImageId::new(page, seq).unwrap()
    }

    #[test]
    fn save_creates_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path().join("a/b/images"));
        let path = store.save(&id(1, 1), b"png-bytes", "png").unwrap();
        assert_eq!(path, tmp.path().join("a/b/images/page_1_1.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }

    #[test]
    fn same_id_twice_last_write_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());
        store.save(&id(2, 1), b"first", "png").unwrap();
        let path = store.save(&id(2, 1), b"second", "png").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let files: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "no duplicates or leftover temp files");
    }

    #[test]
    fn unrelated_files_survive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "keep me").unwrap();
        let store = ImageStore::new(tmp.path());
        store.save(&id(1, 1), b"x", "png").unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("notes.txt")).unwrap(), "keep me");
    }

    #[test]
    fn empty_bytes_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());
        let err = store.save(&id(1, 1), b"", "png").unwrap_err();
        assert!(matches!(err, Pdf2VolumeError::EmptyImageData { .. }));
    }

    #[test]
    fn directory_blocked_by_file_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("images");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ImageStore::new(&blocker);
        let err = store.save(&id(1, 1), b"x", "png").unwrap_err();
        assert!(matches!(err, Pdf2VolumeError::Storage { .. }), "got {err:?}");
        assert_eq!(err.stage(), "store");
    }
}
