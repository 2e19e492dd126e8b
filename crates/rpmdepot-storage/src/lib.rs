//! Rpmdepot Storage Library
//!
//! File storage for RPM repository artifacts over a GridFS-style document
//! store: one `fs.files` collection describing each artifact, one
//! `fs.chunks` sibling holding the blob, and a storage service that owns
//! path-based identity, overwrite, the deletion lifecycle and repair of
//! corrupt records.
//!
//! # Storage keys
//!
//! Files are addressed by their canonical repository path,
//! `repo/arch/filename` (see `FileDescriptor` in `rpmdepot-core`). The
//! filename is deliberately non-unique at the blob layer: duplicates are a
//! legitimate transient state and are reconciled by the overwrite path.

pub mod factory;
#[cfg(feature = "storage-gridfs")]
pub mod gridfs;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod schema;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-gridfs")]
pub use gridfs::GridFsFileStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryFileStorage;
pub use rpmdepot_core::StorageBackend;
pub use traits::{FileStorage, StorageError, StorageResult};
