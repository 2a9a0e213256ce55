//! Hash computation and object identity for the kit storage core.
//!
//! Provides the `ObjectId` type (a 160-bit content digest, the sole
//! addressing scheme of the object store), hex encoding/decoding, and
//! streaming hash computation.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
