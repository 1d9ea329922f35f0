use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::UtilError;
use crate::Result;

const LOCK_SUFFIX: &str = ".lock";

/// RAII guard for the `<path>.lock` single-writer protocol.
///
/// Acquiring creates `<path>.lock` with O_CREAT|O_EXCL; the guard removes
/// the lock file when dropped or explicitly released. A lock file that was
/// already present when we tried to acquire belongs to someone else and is
/// never touched: the acquire fails and no guard exists for it.
pub struct LockFile {
    /// The protected target path (without the .lock suffix).
    path: PathBuf,
    /// The lock marker path (with the .lock suffix).
    lock_path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Acquire the lock for `path` by exclusively creating `<path>.lock`.
    ///
    /// Fails with [`UtilError::AlreadyLocked`] when the marker exists.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        OpenOptions::new()
            .write(true)
            .create_new(true) // O_CREAT|O_EXCL equivalent
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    UtilError::AlreadyLocked {
                        path: lock_path.clone(),
                    }
                } else {
                    UtilError::LockCreate {
                        path: lock_path.clone(),
                        source: e,
                    }
                }
            })?;

        Ok(Self {
            path,
            lock_path,
            released: false,
        })
    }

    /// Acquire without surfacing contention as an error.
    ///
    /// Returns `Ok(None)` when another process holds the lock.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(UtilError::AlreadyLocked { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The protected target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock marker path.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Remove the lock marker now instead of waiting for Drop.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.lock_path)?;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_marker() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");

        let lock = LockFile::acquire(&target).unwrap();
        assert!(dir.path().join("index.lock").exists());
        assert_eq!(lock.path(), target);
        drop(lock);
        assert!(!dir.path().join("index.lock").exists());
    }

    #[test]
    fn contention_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");

        let _held = LockFile::acquire(&target).unwrap();
        match LockFile::acquire(&target) {
            Err(UtilError::AlreadyLocked { .. }) => {}
            Err(e) => panic!("expected AlreadyLocked, got error: {e}"),
            Ok(_) => panic!("expected AlreadyLocked, got Ok"),
        }
    }

    #[test]
    fn foreign_lock_survives_failed_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");
        let marker = dir.path().join("index.lock");
        fs::write(&marker, b"").unwrap();

        assert!(LockFile::acquire(&target).is_err());
        // The failed acquire must not have cleaned up someone else's lock.
        assert!(marker.exists());
    }

    #[test]
    fn try_acquire_reports_contention_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");

        let held = LockFile::try_acquire(&target).unwrap();
        assert!(held.is_some());
        assert!(LockFile::try_acquire(&target).unwrap().is_none());
    }

    #[test]
    fn release_removes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");

        let lock = LockFile::acquire(&target).unwrap();
        lock.release().unwrap();
        assert!(!dir.path().join("index.lock").exists());
    }
}
