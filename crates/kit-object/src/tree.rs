use std::collections::BTreeMap;

use bstr::{BStr, BString, ByteSlice};
use kit_hash::ObjectId;

use crate::ObjectError;

/// File mode for tree and index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (100644)
    Regular,
    /// Executable file (100755)
    Executable,
    /// Subdirectory (40000)
    Directory,
    /// Unknown mode (preserved for round-trip)
    Unknown(u32),
}

impl FileMode {
    /// Parse from octal ASCII bytes (e.g., `b"100644"`).
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        let raw = parse_octal(s)
            .ok_or_else(|| ObjectError::InvalidFileMode(String::from_utf8_lossy(s).into()))?;
        Ok(Self::from_raw(raw))
    }

    /// Create from the raw numeric value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0o100644 => Self::Regular,
            0o100755 => Self::Executable,
            0o040000 => Self::Directory,
            other => Self::Unknown(other),
        }
    }

    /// Serialize to octal ASCII bytes (no leading zero for directories).
    pub fn as_bytes(&self) -> BString {
        BString::from(format!("{:o}", self.raw()))
    }

    /// The raw numeric value.
    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Directory => 0o40000,
            Self::Unknown(v) => *v,
        }
    }

    /// Is this a directory entry?
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Parse an octal ASCII string to u32.
fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut val: u32 = 0;
    for &b in s {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        val = val.checked_mul(8)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(val)
}

/// A flat staged entry handed to the tree builder: a full repo-relative
/// path (forward-slash separated) plus the blob's OID and file mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: BString,
    pub oid: ObjectId,
    pub mode: FileMode,
}

impl PathEntry {
    pub fn new(path: impl Into<BString>, oid: ObjectId, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
        }
    }
}

/// A node in a built or deserialized tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// A file entry, or a stub from deserialization carrying only name,
    /// OID, and mode.
    Leaf {
        name: BString,
        oid: ObjectId,
        mode: FileMode,
    },
    /// A nested directory.
    Subtree(Tree),
}

impl TreeNode {
    /// The entry name (base name, no separators).
    pub fn name(&self) -> &BStr {
        match self {
            Self::Leaf { name, .. } => name.as_bstr(),
            Self::Subtree(t) => t.name(),
        }
    }

    /// The node's OID. `None` for a subtree that has not been traversed.
    pub fn oid(&self) -> Option<ObjectId> {
        match self {
            Self::Leaf { oid, .. } => Some(*oid),
            Self::Subtree(t) => t.oid(),
        }
    }

    /// The mode string written in front of this node's serialized record.
    pub fn mode_bytes(&self) -> BString {
        match self {
            Self::Leaf { mode, .. } => mode.as_bytes(),
            Self::Subtree(_) => FileMode::Directory.as_bytes(),
        }
    }
}

/// A directory snapshot: children keyed by name, in ascending byte order.
///
/// Built transiently per snapshot from the staging index's flat entries;
/// only the serialized form (in the object store) survives. The tree's own
/// OID stays `None` until [`traverse`](Tree::traverse) has stored every
/// child, making "children hashed before parents" structural rather than
/// a convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    name: BString,
    oid: Option<ObjectId>,
    entries: BTreeMap<BString, TreeNode>,
}

impl Tree {
    /// Create an empty root tree.
    pub fn new() -> Self {
        Self::named(BString::default())
    }

    fn named(name: BString) -> Self {
        Self {
            name,
            oid: None,
            entries: BTreeMap::new(),
        }
    }

    /// Build a tree from flat staged entries.
    ///
    /// Each entry's path is split into directory components; subtrees are
    /// created on demand and the entry becomes a leaf under its base name.
    /// Fails with [`ObjectError::EntryConflict`] if a component that
    /// already holds a leaf must act as a directory. The staging index's
    /// own conflict resolution should prevent that, but the builder
    /// defends independently since it may be fed external entry sets.
    pub fn build(entries: impl IntoIterator<Item = PathEntry>) -> Result<Self, ObjectError> {
        let mut root = Self::new();
        for entry in entries {
            let path = entry.path.clone();
            let components: Vec<&[u8]> = path.split_str("/").collect();
            let dirs = &components[..components.len() - 1];
            root.add_entry(dirs, entry)?;
        }
        Ok(root)
    }

    fn add_entry(&mut self, dirs: &[&[u8]], entry: PathEntry) -> Result<(), ObjectError> {
        let Some((&dir, rest)) = dirs.split_first() else {
            let name = basename(entry.path.as_bstr());
            self.entries.insert(
                name.clone(),
                TreeNode::Leaf {
                    name,
                    oid: entry.oid,
                    mode: entry.mode,
                },
            );
            return Ok(());
        };

        let node = self
            .entries
            .entry(BString::from(dir))
            .or_insert_with(|| TreeNode::Subtree(Tree::named(BString::from(dir))));

        match node {
            TreeNode::Subtree(sub) => sub.add_entry(rest, entry),
            TreeNode::Leaf { .. } => Err(ObjectError::EntryConflict {
                path: entry.path.clone(),
            }),
        }
    }

    /// Depth-first post-order traversal: every subtree's children are
    /// stored (and their OIDs finalized) before the subtree itself is
    /// handed to `store`. The root's OID is known only after this returns.
    pub fn traverse<F, E>(&mut self, store: &mut F) -> Result<(), E>
    where
        F: FnMut(&Tree) -> Result<ObjectId, E>,
    {
        for node in self.entries.values_mut() {
            if let TreeNode::Subtree(sub) = node {
                sub.traverse(store)?;
            }
        }
        let oid = store(self)?;
        self.oid = Some(oid);
        Ok(())
    }

    /// Serialize this tree's payload: for each child in ascending name
    /// order, `"<mode> <name>\0<20 raw OID bytes>"`.
    ///
    /// Child order is plain byte order of names; files and directories are
    /// never grouped by type.
    pub fn serialize_payload(&self) -> Result<Vec<u8>, ObjectError> {
        let mut out = Vec::new();
        for (name, node) in &self.entries {
            let oid = node.oid().ok_or_else(|| ObjectError::UnhashedSubtree {
                name: name.clone(),
            })?;
            out.extend_from_slice(&node.mode_bytes());
            out.push(b' ');
            out.extend_from_slice(name);
            out.push(0);
            out.extend_from_slice(oid.as_bytes());
        }
        Ok(out)
    }

    /// Parse tree payload: repeated `"<mode> <name>\0<20 raw OID bytes>"`
    /// records until the input is exhausted.
    ///
    /// A directory mode yields a childless subtree node carrying its OID;
    /// callers fetch its children lazily with further object-store reads.
    /// Any other mode yields a leaf stub.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = Self::new();
        let mut pos = 0;

        while pos < payload.len() {
            let space_pos = payload[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?
                + pos;

            let mode = FileMode::from_bytes(&payload[pos..space_pos]).map_err(|_| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "invalid mode".into(),
                }
            })?;

            let name_start = space_pos + 1;
            let null_pos = payload[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "missing null after name".into(),
                })?
                + name_start;

            let name = BString::from(&payload[name_start..null_pos]);

            let oid_start = null_pos + 1;
            let oid_end = oid_start + 20;
            if oid_end > payload.len() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: oid_start,
                    reason: "truncated OID".into(),
                });
            }
            let oid = ObjectId::from_bytes(&payload[oid_start..oid_end])?;

            let node = if mode.is_directory() {
                TreeNode::Subtree(Tree {
                    name: name.clone(),
                    oid: Some(oid),
                    entries: BTreeMap::new(),
                })
            } else {
                TreeNode::Leaf {
                    name: name.clone(),
                    oid,
                    mode,
                }
            };
            tree.entries.insert(name, node);
            pos = oid_end;
        }

        Ok(tree)
    }

    /// The tree's name (empty for the root).
    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    /// The tree's OID, populated by [`traverse`](Tree::traverse) (or by
    /// deserialization). `None` before then.
    pub fn oid(&self) -> Option<ObjectId> {
        self.oid
    }

    /// Lookup a direct child by name.
    pub fn find(&self, name: &BStr) -> Option<&TreeNode> {
        self.entries.get(name)
    }

    /// Iterate direct children in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&BStr, &TreeNode)> {
        self.entries.iter().map(|(k, v)| (k.as_bstr(), v))
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no children.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn basename(path: &BStr) -> BString {
    match path.rfind_byte(b'/') {
        Some(pos) => BString::from(&path[pos + 1..]),
        None => BString::from(&path[..]),
    }
}
