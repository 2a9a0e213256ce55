use bstr::{BStr, BString, ByteSlice};
use kit_hash::ObjectId;

use crate::ObjectError;

/// An author or committer line: identity plus a timestamp with UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    /// Seconds since the Unix epoch.
    pub time: i64,
    /// Timezone offset in `±HHMM` form, e.g. `+0200`.
    pub offset: BString,
}

impl Signature {
    pub fn new(
        name: impl Into<BString>,
        email: impl Into<BString>,
        time: i64,
        offset: impl Into<BString>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            offset: offset.into(),
        }
    }

    /// Serialize as `Name <email> time offset`.
    pub fn serialize(&self) -> BString {
        let mut out = BString::default();
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.time.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.offset);
        out
    }

    /// Parse a `Name <email> time offset` line.
    pub fn parse(line: &BStr) -> Result<Self, ObjectError> {
        let email_open = line
            .find_byte(b'<')
            .ok_or_else(|| invalid_signature(line, "missing '<'"))?;
        let email_close = line[email_open..]
            .find_byte(b'>')
            .map(|p| p + email_open)
            .ok_or_else(|| invalid_signature(line, "missing '>'"))?;

        if email_open == 0 || line[email_open - 1] != b' ' {
            return Err(invalid_signature(line, "missing space before email"));
        }
        let name = BString::from(&line[..email_open - 1]);
        let email = BString::from(&line[email_open + 1..email_close]);

        let rest = line[email_close + 1..]
            .strip_prefix(b" ")
            .ok_or_else(|| invalid_signature(line, "missing timestamp"))?;
        let mut fields = rest.split_str(" ");
        let time_bytes = fields
            .next()
            .ok_or_else(|| invalid_signature(line, "missing timestamp"))?;
        let offset = fields
            .next()
            .ok_or_else(|| invalid_signature(line, "missing timezone offset"))?;

        let time: i64 = std::str::from_utf8(time_bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| invalid_signature(line, "bad timestamp"))?;

        Ok(Self {
            name,
            email,
            time,
            offset: BString::from(offset),
        })
    }
}

fn invalid_signature(line: &BStr, reason: &str) -> ObjectError {
    ObjectError::InvalidSignature(format!("{reason} in {:?}", line))
}

/// A commit: a tree OID, an optional parent, identities, and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: BString,
}

impl Commit {
    /// Create a commit where author and committer are the same identity.
    pub fn new(
        tree: ObjectId,
        parent: Option<ObjectId>,
        author: Signature,
        message: impl Into<BString>,
    ) -> Self {
        Self {
            tree,
            parent,
            committer: author.clone(),
            author,
            message: message.into(),
        }
    }

    /// Serialize the commit payload: headers, blank line, message.
    pub fn serialize_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');
        if let Some(parent) = &self.parent {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.serialize());
        out.push(b'\n');
        out.extend_from_slice(b"committer ");
        out.extend_from_slice(&self.committer.serialize());
        out.push(b'\n');
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// Parse a commit payload.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut committer = None;

        let mut pos = 0;
        while pos < payload.len() {
            let line_end = payload[pos..]
                .find_byte(b'\n')
                .map(|p| p + pos)
                .unwrap_or(payload.len());
            let line = payload[pos..line_end].as_bstr();
            pos = line_end + 1;

            // Blank line separates headers from the message.
            if line.is_empty() {
                break;
            }

            let (key, value) = match line.find_byte(b' ') {
                Some(sp) => (line[..sp].as_bytes(), line[sp + 1..].as_bstr()),
                None => {
                    return Err(ObjectError::InvalidHeader(format!(
                        "malformed commit header line: {:?}",
                        line
                    )))
                }
            };

            match key {
                b"tree" => tree = Some(parse_hex_oid(value)?),
                b"parent" => parent = Some(parse_hex_oid(value)?),
                b"author" => author = Some(Signature::parse(value)?),
                b"committer" => committer = Some(Signature::parse(value)?),
                // Unknown headers are skipped for forward compatibility.
                _ => {}
            }
        }

        let message = BString::from(&payload[pos.min(payload.len())..]);

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let author = author.ok_or(ObjectError::MissingCommitField { field: "author" })?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Self {
            tree,
            parent,
            author,
            committer,
            message,
        })
    }
}

fn parse_hex_oid(value: &BStr) -> Result<ObjectId, ObjectError> {
    Ok(ObjectId::from_hex(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_oid() -> ObjectId {
        ObjectId::from_hex(b"e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap()
    }

    fn sig() -> Signature {
        Signature::new("Ada Lovelace", "ada@example.com", 1700000000, "+0100")
    }

    #[test]
    fn signature_roundtrip() {
        let s = sig();
        let line = s.serialize();
        let parsed = Signature::parse(line.as_bstr()).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn signature_serializes_expected_form() {
        assert_eq!(
            sig().serialize(),
            "Ada Lovelace <ada@example.com> 1700000000 +0100"
        );
    }

    #[test]
    fn signature_with_spaces_in_name() {
        let s = Signature::new("Jean-Luc van der Berg", "jl@example.com", 42, "-0800");
        let parsed = Signature::parse(s.serialize().as_bstr()).unwrap();
        assert_eq!(parsed.name, "Jean-Luc van der Berg");
        assert_eq!(parsed.time, 42);
    }

    #[test]
    fn signature_missing_email_fails() {
        assert!(Signature::parse(BStr::new("Ada 1700000000 +0100")).is_err());
    }

    #[test]
    fn root_commit_roundtrip() {
        let commit = Commit::new(some_oid(), None, sig(), "initial\n");
        let payload = commit.serialize_payload();
        let parsed = Commit::parse(&payload).unwrap();
        assert_eq!(parsed, commit);
        assert!(parsed.parent.is_none());
    }

    #[test]
    fn child_commit_roundtrip() {
        let commit = Commit::new(some_oid(), Some(some_oid()), sig(), "second commit\n\nbody\n");
        let payload = commit.serialize_payload();
        let parsed = Commit::parse(&payload).unwrap();
        assert_eq!(parsed, commit);
        assert!(parsed.parent.is_some());
    }

    #[test]
    fn parse_skips_unknown_headers() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"tree e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\n");
        payload.extend_from_slice(b"gpgsig something-opaque\n");
        payload.extend_from_slice(b"author Ada <ada@example.com> 1 +0000\n");
        payload.extend_from_slice(b"committer Ada <ada@example.com> 1 +0000\n");
        payload.extend_from_slice(b"\nmsg");
        let commit = Commit::parse(&payload).unwrap();
        assert_eq!(commit.message, "msg");
    }

    #[test]
    fn parse_missing_tree_fails() {
        let payload = b"author Ada <ada@example.com> 1 +0000\n\nmsg";
        let err = Commit::parse(payload).unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MissingCommitField { field: "tree" }
        ));
    }

    #[test]
    fn parse_missing_author_fails() {
        let payload = b"tree e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\n\nmsg";
        let err = Commit::parse(payload).unwrap_err();
        assert!(matches!(
            err,
            ObjectError::MissingCommitField { field: "author" }
        ));
    }
}
