//! Content-addressable object database.
//!
//! Each object lives at `objects/XX/YYYY...` where `XX` is the first byte
//! of the OID in hex and `YYYY...` is the rest. The file content is
//! zlib-compressed `"<type> <size>\0<payload>"`. Objects are immutable:
//! a write for an OID that already exists is a no-op, and identical
//! payloads always map to the same file.

mod read;
mod write;

use std::path::{Path, PathBuf};

use kit_hash::ObjectId;
use kit_utils::LockError;

/// Interface to the objects directory.
pub struct Database {
    /// Path to the objects directory.
    objects_dir: PathBuf,
    /// Zlib compression level.
    compression_level: flate2::Compression,
}

impl Database {
    /// Open the object database at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compression_level: flate2::Compression::default(),
        }
    }

    /// Set the zlib compression level (0–9).
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression_level = flate2::Compression::new(level);
    }

    /// Get the file path for a given OID.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }
}

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("object {oid} not found")]
    NotFound { oid: String },

    #[error("another process is writing object {oid}; retry later")]
    LockConflict { oid: String },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: String, reason: String },

    #[error("decompression error for {oid}: {source}")]
    Decompress {
        oid: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object parse error: {0}")]
    Object(#[from] kit_object::ObjectError),

    #[error("lock error: {0}")]
    Lock(LockError),
}

impl DbError {
    pub(crate) fn from_lock(err: LockError, oid: &ObjectId) -> Self {
        if err.is_conflict() {
            Self::LockConflict { oid: oid.to_hex() }
        } else {
            Self::Lock(err)
        }
    }
}
