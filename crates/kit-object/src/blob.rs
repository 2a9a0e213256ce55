use crate::ObjectError;

/// A blob — raw file content, no metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Parse blob payload. A blob is simply its raw bytes.
    pub fn parse(payload: &[u8]) -> Result<Self, ObjectError> {
        Ok(Self {
            data: payload.to_vec(),
        })
    }

    /// Serialize: blob payload is just the raw data.
    pub fn serialize_payload(&self) -> &[u8] {
        &self.data
    }
}
