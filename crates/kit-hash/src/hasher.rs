use digest::Digest;
use sha1::Sha1;

use crate::oid::OID_RAW_LEN;
use crate::ObjectId;

/// Streaming SHA-1 computation.
///
/// Data can be fed incrementally with [`update`](Hasher::update) or through
/// the [`std::io::Write`] implementation, then finalised into an
/// [`ObjectId`].
pub struct Hasher {
    inner: Sha1,
}

impl Hasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the ObjectId.
    pub fn finalize(self) -> ObjectId {
        let result = self.inner.finalize();
        let mut bytes = [0u8; OID_RAW_LEN];
        bytes.copy_from_slice(result.as_slice());
        // from_bytes cannot fail for a 20-byte digest, so build directly.
        ObjectId::from_bytes(&bytes).unwrap_or(ObjectId::NULL)
    }

    /// Convenience: hash data in one call. This is the OID generator used
    /// for object identity and index checksums alike.
    pub fn digest(data: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }

    /// Hash an object's canonical form: `"{type} {len}\0{payload}"`.
    pub fn hash_object(type_tag: &str, payload: &[u8]) -> ObjectId {
        let header = format!("{} {}\0", type_tag, payload.len());
        let mut h = Self::new();
        h.update(header.as_bytes());
        h.update(payload);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_input() {
        let oid = Hasher::digest(b"");
        assert_eq!(oid.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn digest_known_vector() {
        let oid = Hasher::digest(b"abc");
        assert_eq!(oid.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = Hasher::new();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), Hasher::digest(b"hello world"));
    }

    #[test]
    fn write_impl_matches_update() {
        use std::io::Write;
        let mut h = Hasher::new();
        h.write_all(b"hello world").unwrap();
        assert_eq!(h.finalize(), Hasher::digest(b"hello world"));
    }

    #[test]
    fn hash_object_empty_blob() {
        let oid = Hasher::hash_object("blob", b"");
        assert_eq!(oid.to_hex(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn hash_object_empty_tree() {
        let oid = Hasher::hash_object("tree", b"");
        assert_eq!(oid.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn hash_object_matches_manual_header() {
        let payload = b"what is up, doc?";
        let mut data = format!("blob {}\0", payload.len()).into_bytes();
        data.extend_from_slice(payload);
        assert_eq!(Hasher::hash_object("blob", payload), Hasher::digest(&data));
    }
}
