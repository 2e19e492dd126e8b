//! Configuration module
//!
//! Environment-driven configuration for the storage factory and the
//! whitelist filter. The two security knobs correspond to the runtime
//! management attributes of the whitelist filter:
//!
//! - `WHITELIST_HOSTS` — comma-delimited host patterns
//!   (`security.whitelist.hosts`)
//! - `WHITELIST_MODIFICATION_ENABLED` — whether runtime writes to the
//!   pattern list are accepted (`security.whitelist.modification.enabled`,
//!   boot-time only)

use std::env;

use crate::error::ConfigError;
use crate::storage_backend::StorageBackend;

const DEFAULT_MONGODB_DATABASE: &str = "rpmdepot";

/// Process-level configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Selected storage backend. `None` lets the factory fall back to GridFS.
    pub storage_backend: Option<StorageBackend>,
    /// MongoDB connection string; required by the GridFS backend only.
    pub mongodb_url: Option<String>,
    pub mongodb_database: String,
    /// Comma-delimited whitelist host patterns.
    pub whitelist_hosts: String,
    /// Whether the whitelist may be replaced at runtime.
    pub whitelist_modification_enabled: bool,
}

impl Config {
    /// Read configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => Some(value.parse()?),
            Err(_) => None,
        };

        Ok(Config {
            storage_backend,
            mongodb_url: env::var("MONGODB_URL").ok(),
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| DEFAULT_MONGODB_DATABASE.to_string()),
            whitelist_hosts: env::var("WHITELIST_HOSTS").unwrap_or_default(),
            whitelist_modification_enabled: parse_bool(
                "WHITELIST_MODIFICATION_ENABLED",
                env::var("WHITELIST_MODIFICATION_ENABLED").ok(),
            )?,
        })
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref() {
        None | Some("") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("K", Some("true".into())).unwrap());
        assert!(parse_bool("K", Some("1".into())).unwrap());
        assert!(!parse_bool("K", Some("false".into())).unwrap());
        assert!(!parse_bool("K", Some("0".into())).unwrap());
        assert!(!parse_bool("K", None).unwrap());
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        assert!(parse_bool("K", Some("yes please".into())).is_err());
    }
}
