//! Repository layout and glue.
//!
//! A repository is a workspace root with a `.kit` directory holding the
//! object database (`objects/`), the staging index (`index`), refs
//! (`refs/`), and `HEAD`. This crate wires the storage crates to those
//! paths; it never walks the worktree itself.

mod refs;

use std::fs;
use std::path::{Path, PathBuf};

use kit_index::Index;
use kit_odb::Database;
use kit_utils::LockError;

pub use refs::Refs;

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("invalid ref content: {0}")]
    InvalidRef(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

/// Handle to a repository rooted at a workspace directory.
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    /// Bind to an existing (or yet-to-be-initialized) workspace root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create the repository directory skeleton under `root`.
    ///
    /// Idempotent: directories that already exist are left alone.
    pub fn init(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let repo = Self::new(root);
        for dir in ["objects", "refs"] {
            fs::create_dir_all(repo.kit_dir().join(dir))?;
        }
        Ok(repo)
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata directory, `<root>/.kit`.
    pub fn kit_dir(&self) -> PathBuf {
        self.root.join(".kit")
    }

    /// Open the object database over `<root>/.kit/objects`.
    pub fn database(&self) -> Database {
        Database::open(self.kit_dir().join("objects"))
    }

    /// Bind the staging index at `<root>/.kit/index`.
    pub fn index(&self) -> Index {
        Index::new(self.kit_dir().join("index"))
    }

    /// Bind the refs store over `<root>/.kit`.
    pub fn refs(&self) -> Refs {
        Refs::new(self.kit_dir())
    }
}
