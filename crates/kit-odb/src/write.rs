use std::fs;
use std::io::Write;

use flate2::write::ZlibEncoder;
use kit_hash::{Hasher, ObjectId};
use kit_object::{header, Object, ObjectType};
use kit_utils::LockFile;

use crate::{Database, DbError};

impl Database {
    /// Store an object. Returns the OID.
    ///
    /// No-op if the object already exists (idempotent): an existing file
    /// for the OID is never rewritten. Fails with
    /// [`DbError::LockConflict`] if another writer holds the slot; since
    /// content addressing means the competing writer is producing
    /// identical bytes, callers may treat that as success.
    pub fn store(&self, obj: &Object) -> Result<ObjectId, DbError> {
        let payload = obj.serialize_payload()?;
        self.store_raw(obj.object_type(), &payload)
    }

    /// Store raw payload bytes with a known type. Returns the OID.
    pub fn store_raw(&self, obj_type: ObjectType, payload: &[u8]) -> Result<ObjectId, DbError> {
        let hdr = header::write_header(obj_type, payload.len());

        // OID is the hash of uncompressed header + payload.
        let oid = {
            let mut hasher = Hasher::new();
            hasher.update(&hdr);
            hasher.update(payload);
            hasher.finalize()
        };

        if self.contains(&oid) {
            return Ok(oid);
        }

        // Ensure the fan-out directory exists.
        let final_path = self.object_path(&oid);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Compress into the lock file, then atomically rename into place.
        let mut lock =
            LockFile::acquire(&final_path).map_err(|e| DbError::from_lock(e, &oid))?;
        {
            let mut encoder = ZlibEncoder::new(&mut lock, self.compression_level);
            encoder.write_all(&hdr)?;
            encoder.write_all(payload)?;
            encoder.finish()?;
        }
        lock.commit().map_err(|e| DbError::from_lock(e, &oid))?;

        // Loose objects are read-only once in place.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&final_path, fs::Permissions::from_mode(0o444))?;
        }

        Ok(oid)
    }
}
