//! Index integration tests against real on-disk files.

use std::fs;
use std::path::PathBuf;

use bstr::{BStr, BString};
use kit_hash::Hasher;
use kit_index::{Entry, Index, IndexError};
use kit_object::FileMode;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.path().join("index.lock")
    }

    /// Create a real file and build an entry for it under `staged_path`.
    fn entry(&self, staged_path: &str, content: &[u8]) -> Entry {
        let file = self.dir.path().join(staged_path.replace('/', "_"));
        fs::write(&file, content).unwrap();
        let meta = fs::metadata(&file).unwrap();
        let oid = Hasher::hash_object("blob", content);
        Entry::new(staged_path, oid, &meta)
    }
}

fn staged_paths(index: &Index) -> Vec<BString> {
    index.entries().map(|e| e.path.clone()).collect()
}

#[test]
fn roundtrip_through_disk() {
    let fx = Fixture::new();

    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("b.txt", b"bee"));
    index.add(fx.entry("a/nested.txt", b"nested"));
    index.write_updates().unwrap();

    let mut reloaded = Index::new(fx.index_path());
    reloaded.load().unwrap();
    assert_eq!(
        staged_paths(&reloaded),
        vec![BString::from("a/nested.txt"), BString::from("b.txt")]
    );

    let original = index.get(BStr::new("b.txt")).unwrap();
    let read_back = reloaded.get(BStr::new("b.txt")).unwrap();
    assert_eq!(read_back.oid, original.oid);
    assert_eq!(read_back.mode, original.mode);
    assert_eq!(read_back.stat, original.stat);
}

#[test]
fn long_path_roundtrips_via_sentinel() {
    let fx = Fixture::new();
    let long_path = format!("deep/{}/leaf.txt", "d".repeat(5000));
    assert!(long_path.len() > 0xFFF);

    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();

    let file = fx.dir.path().join("payload");
    fs::write(&file, b"long path content").unwrap();
    let meta = fs::metadata(&file).unwrap();
    let oid = Hasher::hash_object("blob", b"long path content");
    index.add(Entry::new(long_path.as_str(), oid, &meta));
    index.add(fx.entry("short.txt", b"short"));
    index.write_updates().unwrap();

    let mut reloaded = Index::new(fx.index_path());
    reloaded.load().unwrap();
    assert_eq!(
        staged_paths(&reloaded),
        vec![BString::from(long_path), BString::from("short.txt")]
    );
}

#[test]
fn flipped_byte_fails_checksum_before_anything_else() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("file.txt", b"content"));
    index.write_updates().unwrap();

    let mut data = fs::read(fx.index_path()).unwrap();
    // Corrupt the version field; the checksum must trip before the
    // version check does.
    data[5] ^= 0x01;
    fs::write(fx.index_path(), &data).unwrap();

    let mut reloaded = Index::new(fx.index_path());
    assert!(matches!(
        reloaded.load(),
        Err(IndexError::ChecksumMismatch)
    ));
}

#[test]
fn unsupported_version_is_rejected() {
    let fx = Fixture::new();

    // A well-checksummed header claiming version 3 with no entries.
    let mut data = Vec::new();
    data.extend_from_slice(b"DIRC");
    data.extend_from_slice(&3u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    let checksum = Hasher::digest(&data);
    data.extend_from_slice(checksum.as_bytes());
    fs::write(fx.index_path(), &data).unwrap();

    let mut index = Index::new(fx.index_path());
    assert!(matches!(
        index.load(),
        Err(IndexError::UnsupportedVersion(3))
    ));
}

#[test]
fn unchanged_index_rolls_back_without_writing() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("keep.txt", b"keep"));
    index.write_updates().unwrap();
    let bytes_before = fs::read(fx.index_path()).unwrap();

    let mut again = Index::new(fx.index_path());
    again.load_for_update().unwrap();
    again.write_updates().unwrap();

    assert_eq!(fs::read(fx.index_path()).unwrap(), bytes_before);
    assert!(!fx.lock_path().exists());
}

#[test]
fn re_staging_identical_content_rolls_back() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("same.txt", b"same bytes"));
    index.write_updates().unwrap();
    let bytes_before = fs::read(fx.index_path()).unwrap();

    let mut again = Index::new(fx.index_path());
    again.load_for_update().unwrap();
    again.add(fx.entry("same.txt", b"same bytes"));
    again.write_updates().unwrap();

    assert_eq!(fs::read(fx.index_path()).unwrap(), bytes_before);
}

#[test]
fn load_missing_file_is_empty_index() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load().unwrap();
    assert!(index.is_empty());
}

#[test]
fn concurrent_update_is_lock_conflict() {
    let fx = Fixture::new();
    let mut first = Index::new(fx.index_path());
    first.load_for_update().unwrap();

    let mut second = Index::new(fx.index_path());
    assert!(matches!(
        second.load_for_update(),
        Err(IndexError::LockConflict { .. })
    ));

    first.rollback().unwrap();
    second.load_for_update().unwrap();
    second.rollback().unwrap();
}

#[test]
fn parse_error_leaves_previous_table_intact() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("survivor.txt", b"still here"));
    index.write_updates().unwrap();

    let mut reader = Index::new(fx.index_path());
    reader.load().unwrap();
    assert_eq!(reader.len(), 1);

    fs::write(fx.index_path(), b"garbage, not an index").unwrap();
    assert!(reader.load().is_err());
    assert_eq!(reader.len(), 1);
    assert!(reader.is_tracked(BStr::new("survivor.txt")));
}

#[test]
fn no_stray_lock_after_write() {
    let fx = Fixture::new();
    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(fx.entry("tidy.txt", b"tidy"));
    index.write_updates().unwrap();
    assert!(!fx.lock_path().exists());
}

#[cfg(unix)]
#[test]
fn executable_bit_survives_roundtrip() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let script = fx.dir.path().join("run.sh");
    fs::write(&script, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let meta = fs::metadata(&script).unwrap();
    let oid = Hasher::hash_object("blob", b"#!/bin/sh\n");

    let mut index = Index::new(fx.index_path());
    index.load_for_update().unwrap();
    index.add(Entry::new("run.sh", oid, &meta));
    index.write_updates().unwrap();

    let mut reloaded = Index::new(fx.index_path());
    reloaded.load().unwrap();
    assert_eq!(
        reloaded.get(BStr::new("run.sh")).unwrap().mode,
        FileMode::Executable
    );
}
