//! Index entry types: Entry and StatData.

use bstr::{BStr, BString, ByteSlice};
use kit_hash::ObjectId;
use kit_object::FileMode;

/// Path lengths at or above this value are stored as the sentinel in the
/// on-disk flags field; the real length is recovered from the NUL
/// terminator.
pub const MAX_PATH_SIZE: usize = 0xFFF;

/// A single staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File path, `/`-separated, relative to the repository root.
    pub path: BString,
    /// Object ID of the staged blob.
    pub oid: ObjectId,
    /// File mode (regular or executable).
    pub mode: FileMode,
    /// Stat data from the file system.
    pub stat: StatData,
}

impl Entry {
    /// Create an entry from file system metadata. The mode is executable
    /// iff the owner-execute bit is set.
    pub fn new(path: impl Into<BString>, oid: ObjectId, meta: &std::fs::Metadata) -> Self {
        Self {
            path: path.into(),
            oid,
            mode: mode_for(meta),
            stat: StatData::from_metadata(meta),
        }
    }

    /// The on-disk flags field: path length, clamped to the sentinel.
    pub fn flags(&self) -> u16 {
        self.path.len().min(MAX_PATH_SIZE) as u16
    }

    /// The final path component.
    pub fn basename(&self) -> &BStr {
        match self.path.rfind_byte(b'/') {
            Some(pos) => self.path[pos + 1..].as_bstr(),
            None => self.path.as_bstr(),
        }
    }

    /// Every ancestor directory of the path, outermost first:
    /// `a/b/c.txt` yields `["a", "a/b"]`.
    pub fn parent_directories(&self) -> Vec<BString> {
        parent_directories(self.path.as_bstr())
    }
}

/// Ancestor directories of a path, outermost first.
pub fn parent_directories(path: &BStr) -> Vec<BString> {
    let mut dirs = Vec::new();
    for (i, &b) in path.iter().enumerate() {
        if b == b'/' {
            dirs.push(BString::from(&path[..i]));
        }
    }
    dirs
}

#[cfg(unix)]
fn mode_for(meta: &std::fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o100 != 0 {
        FileMode::Executable
    } else {
        FileMode::Regular
    }
}

#[cfg(not(unix))]
fn mode_for(_meta: &std::fs::Metadata) -> FileMode {
    FileMode::Regular
}

/// File system stat data cached per entry, 32-bit truncated as the format
/// prescribes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    /// Create from file system metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    /// Create from file system metadata (non-Unix fallback).
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::time::UNIX_EPOCH;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            dev: 0,
            ino: 0,
            uid: 0,
            gid: 0,
            size: meta.len() as u32,
        }
    }
}
