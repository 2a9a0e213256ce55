//! Index file parsing.

use bstr::BString;
use kit_hash::{Hasher, ObjectId};
use kit_object::FileMode;

use crate::entry::{Entry, StatData, MAX_PATH_SIZE};
use crate::IndexError;

/// Magic bytes at the start of every index file.
pub(crate) const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";

/// The only supported on-disk version.
pub(crate) const INDEX_VERSION: u32 = 2;

/// Fixed-width portion of an entry: ten u32 fields plus OID plus flags.
pub(crate) const ENTRY_FIXED_SIZE: usize = 40 + 20 + 2;

/// Total on-disk entry size: fixed part + path, NUL-padded to a multiple
/// of 8 with at least one NUL after the path.
pub(crate) fn ondisk_entry_size(path_len: usize) -> usize {
    (ENTRY_FIXED_SIZE + path_len + 8) & !7
}

/// Parse an index file into its entries, sorted as stored.
pub(crate) fn parse_index(data: &[u8]) -> Result<Vec<Entry>, IndexError> {
    if data.len() < 12 + 20 {
        return Err(IndexError::InvalidHeader("index file too short".into()));
    }

    // Checksum before anything else: a failed checksum invalidates the
    // whole file, not one entry.
    verify_checksum(data)?;

    if &data[..4] != INDEX_SIGNATURE {
        return Err(IndexError::InvalidHeader(format!(
            "bad signature: expected DIRC, got {:?}",
            &data[..4]
        )));
    }
    let version = read_u32(&data[4..]);
    if version != INDEX_VERSION {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = read_u32(&data[8..]) as usize;

    let content_end = data.len() - 20;
    let mut entries = Vec::with_capacity(entry_count);
    let mut cursor = 12;

    for _ in 0..entry_count {
        let (entry, next) = parse_entry(data, cursor, content_end)?;
        entries.push(entry);
        cursor = next;
    }

    Ok(entries)
}

fn parse_entry(
    data: &[u8],
    start: usize,
    content_end: usize,
) -> Result<(Entry, usize), IndexError> {
    if start + ENTRY_FIXED_SIZE > content_end {
        return Err(IndexError::InvalidEntry {
            offset: start,
            reason: "entry too short".into(),
        });
    }

    let stat = StatData {
        ctime_secs: read_u32(&data[start..]),
        ctime_nsecs: read_u32(&data[start + 4..]),
        mtime_secs: read_u32(&data[start + 8..]),
        mtime_nsecs: read_u32(&data[start + 12..]),
        dev: read_u32(&data[start + 16..]),
        ino: read_u32(&data[start + 20..]),
        uid: read_u32(&data[start + 28..]),
        gid: read_u32(&data[start + 32..]),
        size: read_u32(&data[start + 36..]),
    };
    let mode_raw = read_u32(&data[start + 24..]);

    let oid =
        ObjectId::from_bytes(&data[start + 40..start + 60]).map_err(|_| IndexError::InvalidEntry {
            offset: start,
            reason: "invalid OID".into(),
        })?;

    let flags = read_u16(&data[start + 60..]);
    let name_len_field = (flags & 0xFFF) as usize;

    let path_start = start + ENTRY_FIXED_SIZE;
    let path_len = if name_len_field < MAX_PATH_SIZE {
        if path_start + name_len_field >= content_end {
            return Err(IndexError::InvalidEntry {
                offset: start,
                reason: "path exceeds index bounds".into(),
            });
        }
        if data[path_start + name_len_field] != 0 {
            return Err(IndexError::InvalidEntry {
                offset: start,
                reason: "path not NUL terminated at declared length".into(),
            });
        }
        name_len_field
    } else {
        // Sentinel: the real length did not fit in 12 bits. Scan past
        // the sentinel offset for the terminating NUL.
        scan_long_path(data, path_start, content_end).ok_or_else(|| {
            IndexError::InvalidEntry {
                offset: start,
                reason: "missing NUL for long path".into(),
            }
        })?
    };

    let path = BString::from(&data[path_start..path_start + path_len]);

    let next = start + ondisk_entry_size(path_len);
    if next > content_end {
        return Err(IndexError::InvalidEntry {
            offset: start,
            reason: "entry padding exceeds index bounds".into(),
        });
    }

    let entry = Entry {
        path,
        oid,
        mode: FileMode::from_raw(mode_raw),
        stat,
    };
    Ok((entry, next))
}

/// Find the length of a long path whose flags field holds the sentinel.
///
/// The path is at least `MAX_PATH_SIZE` bytes, so the scan for the
/// terminating NUL starts there; the cursor is then realigned with the
/// usual entry-size formula.
fn scan_long_path(data: &[u8], path_start: usize, content_end: usize) -> Option<usize> {
    let scan_from = path_start + MAX_PATH_SIZE;
    if scan_from >= content_end {
        return None;
    }
    data[scan_from..content_end]
        .iter()
        .position(|&b| b == 0)
        .map(|pos| pos + MAX_PATH_SIZE)
}

fn verify_checksum(data: &[u8]) -> Result<(), IndexError> {
    let content = &data[..data.len() - 20];
    let stored = &data[data.len() - 20..];
    let computed = Hasher::digest(content);
    if computed.as_bytes() != stored {
        return Err(IndexError::ChecksumMismatch);
    }
    Ok(())
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn read_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}
