use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Available storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB GridFS (`fs.files` + `fs.chunks`), the production backend.
    GridFs,
    /// In-memory store with the same observable semantics.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gridfs" => Ok(StorageBackend::GridFs),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "STORAGE_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::GridFs => write!(f, "gridfs"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}
