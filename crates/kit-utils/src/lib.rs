//! Shared filesystem primitives.
//!
//! Home of the lock file guard that every mutating write in the storage
//! core goes through.

pub mod error;
pub mod lockfile;

pub use error::LockError;
pub use lockfile::LockFile;

pub type Result<T> = std::result::Result<T, LockError>;
