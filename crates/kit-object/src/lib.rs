//! Object model for the kit storage core.
//!
//! This crate provides Rust types for the three storable object kinds —
//! blob, tree, and commit — their parsing from raw bytes, serialization to
//! canonical format, and supporting types like `ObjectType` and `FileMode`.
//! It also hosts the tree builder that turns a flat, path-sorted entry list
//! into a hierarchy of hash-addressed subtrees.

mod blob;
mod commit;
pub mod header;
mod tree;

pub use blob::Blob;
pub use commit::{Commit, Signature};
pub use tree::{FileMode, PathEntry, Tree, TreeNode};

use bstr::BString;
use kit_hash::{HashError, Hasher, ObjectId};

/// Errors produced by object operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: String },

    #[error("entry conflict: '{path}' is tracked as a file but needed as a directory")]
    EntryConflict { path: BString },

    #[error("subtree '{name}' has not been hashed yet; run traverse first")]
    UnhashedSubtree { name: BString },

    #[error("invalid commit: missing '{field}' header")]
    MissingCommitField { field: &'static str },

    #[error("invalid file mode: {0}")]
    InvalidFileMode(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The three kinds of storable objects. The set is closed: a reader must
/// know every kind it can encounter, so new kinds require a format change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    /// Parse from the type tag in object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    /// The canonical byte representation.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Blob => b"blob",
            Self::Tree => b"tree",
            Self::Commit => b"commit",
        }
    }

    /// The canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A parsed storable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Parse from raw bytes (header + payload).
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (obj_type, payload_size, header_len) = header::parse_header(data)?;
        let payload = &data[header_len..];
        if payload.len() < payload_size {
            return Err(ObjectError::Truncated {
                expected: payload_size,
                actual: payload.len(),
            });
        }
        Self::parse_payload(obj_type, &payload[..payload_size])
    }

    /// Parse from payload bytes with known type (no header).
    pub fn parse_payload(obj_type: ObjectType, payload: &[u8]) -> Result<Self, ObjectError> {
        match obj_type {
            ObjectType::Blob => Ok(Self::Blob(Blob::parse(payload)?)),
            ObjectType::Tree => Ok(Self::Tree(Tree::parse(payload)?)),
            ObjectType::Commit => Ok(Self::Commit(Commit::parse(payload)?)),
        }
    }

    /// Serialize to canonical format (header + payload).
    pub fn serialize(&self) -> Result<Vec<u8>, ObjectError> {
        let payload = self.serialize_payload()?;
        let hdr = header::write_header(self.object_type(), payload.len());
        let mut out = Vec::with_capacity(hdr.len() + payload.len());
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Serialize just the payload (no header).
    ///
    /// Fallible because serializing a built tree whose subtrees have not
    /// been hashed is an ordering bug, surfaced as
    /// [`ObjectError::UnhashedSubtree`] rather than a silent wrong answer.
    pub fn serialize_payload(&self) -> Result<Vec<u8>, ObjectError> {
        match self {
            Self::Blob(b) => Ok(b.serialize_payload().to_vec()),
            Self::Tree(t) => t.serialize_payload(),
            Self::Commit(c) => Ok(c.serialize_payload()),
        }
    }

    /// Get the object type tag.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Blob(_) => ObjectType::Blob,
            Self::Tree(_) => ObjectType::Tree,
            Self::Commit(_) => ObjectType::Commit,
        }
    }

    /// Compute the OID by hashing the canonical serialized form.
    pub fn compute_oid(&self) -> Result<ObjectId, ObjectError> {
        let payload = self.serialize_payload()?;
        Ok(Hasher::hash_object(self.object_type().as_str(), &payload))
    }
}
