use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LockError;
use crate::Result;

/// RAII lock file guard. Creates a `.lock` side file on construction,
/// atomically renames it over the target on commit, removes it on drop
/// if not committed.
///
/// The protocol:
/// - Create `<target>.lock` with O_CREAT|O_EXCL
/// - Write the new contents to the side file
/// - Atomically rename `.lock` onto the target on commit
/// - Remove `.lock` on rollback or drop
///
/// Exclusive creation is the cross-process mutual-exclusion primitive:
/// whoever creates the side file owns write access to the target until
/// commit or rollback. A crash in between leaves only a stray `.lock`
/// file, never a half-written target.
#[derive(Debug)]
pub struct LockFile {
    /// The target file path (without .lock suffix).
    path: PathBuf,
    /// The lock file path (with .lock suffix).
    lock_path: PathBuf,
    /// The open file handle for writing.
    file: Option<File>,
    /// Whether commit() or rollback() has run.
    resolved: bool,
}

const LOCK_SUFFIX: &str = ".lock";

impl LockFile {
    /// Acquire a lock on the given path. Creates `path.lock` exclusively.
    ///
    /// Returns [`LockError::AlreadyLocked`] if the side file exists
    /// (another writer holds the lock), [`LockError::Create`] on any
    /// other filesystem failure.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true) // O_CREAT|O_EXCL equivalent
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    LockError::AlreadyLocked {
                        path: lock_path.clone(),
                    }
                } else {
                    LockError::Create {
                        path: lock_path.clone(),
                        source: e,
                    }
                }
            })?;

        Ok(Self {
            path,
            lock_path,
            file: Some(file),
            resolved: false,
        })
    }

    /// Try to acquire without blocking. Returns `Ok(None)` if already locked,
    /// `Ok(Some(lock))` on success, or `Err` on other failures.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lk) => Ok(Some(lk)),
            Err(LockError::AlreadyLocked { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The path of the target file (without .lock).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path of the side file (with .lock).
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Commit: flush and close the side file, then atomically rename it
    /// onto the target, replacing any existing target.
    pub fn commit(mut self) -> Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush().map_err(|e| LockError::Commit {
                path: self.lock_path.clone(),
                source: e,
            })?;
            file.sync_all().map_err(|e| LockError::Commit {
                path: self.lock_path.clone(),
                source: e,
            })?;
        }
        // Drop the file handle before rename.
        self.file.take();

        fs::rename(&self.lock_path, &self.path).map_err(|e| LockError::Commit {
            path: self.lock_path.clone(),
            source: e,
        })?;

        self.resolved = true;
        Ok(())
    }

    /// Rollback: close and remove the side file, abandoning the write.
    pub fn rollback(mut self) -> Result<()> {
        self.file.take();
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        self.resolved = true; // Prevent Drop from cleaning up again
        Ok(())
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.resolved {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
