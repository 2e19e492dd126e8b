//! Rpmdepot Core Library
//!
//! This crate provides the domain models, configuration and error types
//! shared across all rpmdepot components: file descriptors, the persisted
//! storage-item view and the environment-driven configuration knobs.

pub mod config;
pub mod content_type;
pub mod error;
pub mod models;
pub mod storage_backend;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use content_type::content_type_for;
pub use error::ConfigError;
pub use models::{FileDescriptor, FileMetadata, FileStorageItem, InvalidPath};
pub use storage_backend::StorageBackend;
pub use telemetry::init_telemetry;
