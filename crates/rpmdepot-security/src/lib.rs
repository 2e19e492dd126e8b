//! Rpmdepot Security Library
//!
//! Host-whitelist pre-authentication: requests arriving from trusted
//! network hosts are granted an identity without credentials. The filter
//! is a plain component over `http` header types and a peer address, so it
//! composes into any request pipeline; requests carrying their own
//! `Authorization` header always defer to downstream authenticators.

pub mod hostname;
pub mod whitelist;
pub mod wildcard;

// Re-export commonly used types
pub use hostname::{DnsHostnameResolver, HostName, HostnameResolver, StaticHostnameResolver};
pub use whitelist::{
    Principal, SecurityError, WhitelistAuthenticationFilter, USERNAME_HEADER,
    WHITELIST_MODIFICATION_ENABLED_KEY,
};
pub use wildcard::wildcard_to_regex;
