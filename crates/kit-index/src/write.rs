//! Index file serialization.

use kit_hash::Hasher;

use crate::entry::Entry;
use crate::read::{ondisk_entry_size, INDEX_SIGNATURE, INDEX_VERSION};

/// Serialize the index: header, entries in iteration (path) order, and a
/// trailing SHA-1 over everything before it.
pub(crate) fn serialize_index<'a>(
    entries: impl Iterator<Item = &'a Entry>,
    count: usize,
) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(INDEX_SIGNATURE);
    buf.extend_from_slice(&INDEX_VERSION.to_be_bytes());
    buf.extend_from_slice(&(count as u32).to_be_bytes());

    for entry in entries {
        write_entry(&mut buf, entry);
    }

    let checksum = Hasher::digest(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

fn write_entry(buf: &mut Vec<u8>, entry: &Entry) {
    let entry_start = buf.len();

    buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
    buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
    buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
    buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
    buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
    buf.extend_from_slice(&entry.stat.size.to_be_bytes());

    buf.extend_from_slice(entry.oid.as_bytes());
    buf.extend_from_slice(&entry.flags().to_be_bytes());
    buf.extend_from_slice(&entry.path);

    // NUL-pad to the 8-byte boundary; always at least one NUL terminates
    // the path.
    let entry_size = ondisk_entry_size(entry.path.len());
    let padding = entry_size - (buf.len() - entry_start);
    buf.resize(buf.len() + padding, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StatData;
    use bstr::BString;
    use kit_hash::ObjectId;
    use kit_object::FileMode;

    fn entry(path: &str) -> Entry {
        Entry {
            path: BString::from(path),
            oid: ObjectId::NULL,
            mode: FileMode::Regular,
            stat: StatData::default(),
        }
    }

    #[test]
    fn empty_index_is_header_plus_checksum() {
        let data = serialize_index(std::iter::empty(), 0);
        assert_eq!(data.len(), 12 + 20);
        assert_eq!(&data[..4], b"DIRC");
        assert_eq!(&data[4..8], &2u32.to_be_bytes());
        assert_eq!(&data[8..12], &0u32.to_be_bytes());
    }

    #[test]
    fn entries_are_padded_to_eight_bytes() {
        let e = entry("abc.txt"); // 7 bytes: 62 + 7 = 69, padded to 72
        let data = serialize_index(std::iter::once(&e), 1);
        assert_eq!(data.len(), 12 + 72 + 20);
        // At least one NUL follows the path.
        assert_eq!(data[12 + 62 + 7], 0);
    }

    #[test]
    fn exact_boundary_still_gets_a_nul() {
        // 62 + 10 = 72, already a multiple of 8; the formula forces the
        // next boundary at 80, giving 8 NULs.
        let e = entry("exactly10c");
        let data = serialize_index(std::iter::once(&e), 1);
        assert_eq!(data.len(), 12 + 80 + 20);
        assert!(data[12 + 72..12 + 80].iter().all(|&b| b == 0));
    }
}
