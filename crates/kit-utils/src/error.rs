use std::path::PathBuf;

/// Lock file errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("unable to create lock file '{path}': already locked")]
    AlreadyLocked { path: PathBuf },

    #[error("unable to create lock file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to commit lock file '{path}': {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LockError {
    /// Is this a lock contention failure (another writer holds the side file)?
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyLocked { .. })
    }
}
