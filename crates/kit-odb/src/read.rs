use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use kit_hash::ObjectId;
use kit_object::{header, Object, ObjectType};

use crate::{Database, DbError};

impl Database {
    /// Check whether an object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read an object by OID. A stored file that decompresses but does
    /// not parse is [`DbError::Corrupt`].
    pub fn read(&self, oid: &ObjectId) -> Result<Object, DbError> {
        let decompressed = self.read_raw(oid)?;
        Object::parse(&decompressed).map_err(|e| DbError::Corrupt {
            oid: oid.to_hex(),
            reason: e.to_string(),
        })
    }

    /// Read just the type and payload size without parsing the payload.
    pub fn read_header(&self, oid: &ObjectId) -> Result<(ObjectType, usize), DbError> {
        let compressed = self.read_compressed(oid)?;

        // Decompress only enough to see the header. Headers are well under
        // 64 bytes.
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut buf = [0u8; 64];
        let mut filled = 0;

        loop {
            if filled >= buf.len() {
                return Err(DbError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "header exceeds 64 bytes".into(),
                });
            }
            let n = decoder
                .read(&mut buf[filled..])
                .map_err(|e| DbError::Decompress {
                    oid: oid.to_hex(),
                    source: e,
                })?;
            if n == 0 {
                return Err(DbError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "unexpected EOF before header null terminator".into(),
                });
            }
            filled += n;
            if buf[..filled].contains(&0) {
                break;
            }
        }

        let (obj_type, payload_size, _header_len) =
            header::parse_header(&buf[..filled]).map_err(|e| DbError::Corrupt {
                oid: oid.to_hex(),
                reason: e.to_string(),
            })?;
        Ok((obj_type, payload_size))
    }

    /// Read and decompress the full raw bytes (header + payload).
    pub fn read_raw(&self, oid: &ObjectId) -> Result<Vec<u8>, DbError> {
        let compressed = self.read_compressed(oid)?;
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| DbError::Decompress {
                oid: oid.to_hex(),
                source: e,
            })?;
        Ok(decompressed)
    }

    fn read_compressed(&self, oid: &ObjectId) -> Result<Vec<u8>, DbError> {
        let path = self.object_path(oid);
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DbError::NotFound {
                oid: oid.to_hex(),
            }),
            Err(e) => Err(DbError::Io(e)),
        }
    }
}
