//! Domain models for stored repository artifacts.

mod descriptor;
mod storage_item;

pub use descriptor::{FileDescriptor, InvalidPath};
pub use storage_item::{FileMetadata, FileStorageItem};
