//! The staging index.
//!
//! Tracks which blobs are staged for the next commit, in a sorted binary
//! file guarded by a checksum and a lock file. The index sits between the
//! working tree and the object database: `add` records a path/OID pair
//! (evicting anything it conflicts with), `write_updates` persists the
//! table atomically.

pub mod entry;
mod read;
mod write;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use kit_utils::{LockError, LockFile};

pub use entry::{Entry, StatData};
pub use entry::MAX_PATH_SIZE;

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error(
        "unable to lock index at {path}: another process may be holding it; \
         if no such process is running, remove the stale '.lock' file and retry"
    )]
    LockConflict { path: PathBuf },

    #[error("index write attempted without holding the lock")]
    LockNotHeld,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("lock error: {0}")]
    Lock(LockError),
}

/// The staging index: a sorted table of path → entry, plus a derived map
/// of directory → contained entry paths used for conflict eviction.
pub struct Index {
    /// Path of the on-disk index file.
    path: PathBuf,
    /// Entries keyed by path; BTreeMap keeps iteration sorted.
    entries: BTreeMap<BString, Entry>,
    /// Directory path → full paths of entries beneath it.
    parents: HashMap<BString, BTreeSet<BString>>,
    /// Held between `load_for_update` and `write_updates`/`rollback`.
    lock: Option<LockFile>,
    /// Whether the in-memory table diverges from disk.
    changed: bool,
}

impl Index {
    /// Create an index bound to the given file path. Empty until loaded.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
            parents: HashMap::new(),
            lock: None,
            changed: false,
        }
    }

    /// Load the index from disk, replacing the in-memory table.
    ///
    /// A missing file is an empty index. On a parse error the in-memory
    /// table is left untouched: parsing fills fresh maps which are
    /// installed only on success.
    pub fn load(&mut self) -> Result<(), IndexError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.entries.clear();
                self.parents.clear();
                self.changed = false;
                return Ok(());
            }
            Err(e) => return Err(IndexError::Io(e)),
        };
        let data = unsafe { memmap2::Mmap::map(&file) }?;
        let parsed = read::parse_index(&data)?;

        self.entries.clear();
        self.parents.clear();
        for entry in parsed {
            self.store_entry(entry);
        }
        self.changed = false;
        Ok(())
    }

    /// Acquire the index lock, then load. Every read-modify-write cycle
    /// starts here so the loaded snapshot cannot go stale under us.
    pub fn load_for_update(&mut self) -> Result<(), IndexError> {
        let lock = LockFile::acquire(&self.path).map_err(|e| {
            if e.is_conflict() {
                IndexError::LockConflict {
                    path: self.path.clone(),
                }
            } else {
                IndexError::Lock(e)
            }
        })?;
        self.lock = Some(lock);
        self.load()
    }

    /// Stage an entry, evicting anything that conflicts with it:
    /// ancestor paths tracked as files, and entries beneath the new path
    /// if it was tracked as a directory.
    ///
    /// Re-adding a path whose staged OID is unchanged is a no-op and does
    /// not mark the index dirty, so a later `write_updates` still rolls
    /// back instead of rewriting the file.
    pub fn add(&mut self, entry: Entry) {
        if let Some(existing) = self.entries.get(&entry.path) {
            if existing.oid == entry.oid {
                return;
            }
        }
        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.changed = true;
    }

    /// Iterate entries in ascending path order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by exact path.
    pub fn get(&self, path: &BStr) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Whether the path is tracked, either as a file or as a directory
    /// containing tracked files.
    pub fn is_tracked(&self, path: &BStr) -> bool {
        self.entries.contains_key(path) || self.parents.contains_key(path)
    }

    /// Locate the first untracked component of a path.
    ///
    /// `None` if the path itself is tracked. Otherwise the shallowest
    /// ancestor not tracked as a directory (with a trailing `/`), or the
    /// full path when every ancestor is a tracked directory. An ancestor
    /// tracked as a file is still an untracked directory here.
    pub fn first_untracked_path(&self, path: &BStr) -> Option<BString> {
        if self.is_tracked(path) {
            return None;
        }
        for dir in entry::parent_directories(path) {
            if !self.parents.contains_key(dir.as_bstr()) {
                let mut with_slash = dir;
                with_slash.push(b'/');
                return Some(with_slash);
            }
        }
        Some(BString::from(path.as_bytes()))
    }

    /// Persist the table if it changed; release the lock either way.
    ///
    /// An unchanged index rolls the lock back without touching the file.
    /// Fails with [`IndexError::LockNotHeld`] when called without a prior
    /// [`load_for_update`](Index::load_for_update).
    pub fn write_updates(&mut self) -> Result<(), IndexError> {
        let mut lock = self.lock.take().ok_or(IndexError::LockNotHeld)?;

        if !self.changed {
            lock.rollback().map_err(IndexError::Lock)?;
            return Ok(());
        }

        let data = write::serialize_index(self.entries.values(), self.entries.len());
        {
            use std::io::Write;
            lock.write_all(&data)?;
        }
        lock.commit().map_err(IndexError::Lock)?;
        self.changed = false;
        Ok(())
    }

    /// Release the lock without writing. A no-op when no lock is held.
    pub fn rollback(&mut self) -> Result<(), IndexError> {
        if let Some(lock) = self.lock.take() {
            lock.rollback().map_err(IndexError::Lock)?;
        }
        Ok(())
    }

    fn store_entry(&mut self, entry: Entry) {
        for dir in entry.parent_directories() {
            self.parents
                .entry(dir)
                .or_default()
                .insert(entry.path.clone());
        }
        self.entries.insert(entry.path.clone(), entry);
    }

    fn discard_conflicts(&mut self, entry: &Entry) {
        // An ancestor tracked as a file cannot coexist with this entry.
        for dir in entry.parent_directories() {
            self.remove_entry(dir.as_bstr());
        }
        // Nor can entries living beneath this path as a directory.
        self.remove_children(entry.path.as_bstr());
    }

    fn remove_children(&mut self, path: &BStr) {
        if let Some(children) = self.parents.get(path).cloned() {
            for child in children {
                self.remove_entry(child.as_bstr());
            }
        }
    }

    fn remove_entry(&mut self, path: &BStr) {
        let Some(entry) = self.entries.remove(path) else {
            return;
        };
        for dir in entry.parent_directories() {
            if let Some(set) = self.parents.get_mut(&dir) {
                set.remove(&entry.path);
                if set.is_empty() {
                    self.parents.remove(&dir);
                }
            }
        }
    }
}
