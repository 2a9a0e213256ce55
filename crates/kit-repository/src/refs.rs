use std::fs;
use std::io::Write;
use std::path::PathBuf;

use kit_hash::ObjectId;
use kit_utils::LockFile;

use crate::RepoError;

/// The refs store. Currently a single `HEAD` file holding the OID of the
/// latest commit as 40 hex characters plus a newline.
pub struct Refs {
    dir: PathBuf,
}

impl Refs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn head_path(&self) -> PathBuf {
        self.dir.join("HEAD")
    }

    /// Read `HEAD`. `None` when no commit has been made yet.
    pub fn read_head(&self) -> Result<Option<ObjectId>, RepoError> {
        let raw = match fs::read(self.head_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepoError::Io(e)),
        };
        let hex = raw.strip_suffix(b"\n").unwrap_or(&raw);
        let oid = ObjectId::from_hex(hex)
            .map_err(|e| RepoError::InvalidRef(format!("HEAD: {e}")))?;
        Ok(Some(oid))
    }

    /// Point `HEAD` at a commit, atomically via the lock file.
    pub fn update_head(&self, oid: &ObjectId) -> Result<(), RepoError> {
        let mut lock = LockFile::acquire(self.head_path())?;
        lock.write_all(oid.to_hex().as_bytes())?;
        lock.write_all(b"\n")?;
        lock.commit()?;
        Ok(())
    }
}
