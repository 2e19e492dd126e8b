//! Whitelist pre-authentication filter.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use http::header::AUTHORIZATION;
use http::HeaderMap;
use regex::Regex;
use thiserror::Error;

use crate::hostname::{HostName, HostnameResolver};
use crate::wildcard::wildcard_to_regex;

/// Configuration key gating runtime replacement of the whitelist.
pub const WHITELIST_MODIFICATION_ENABLED_KEY: &str = "security.whitelist.modification.enabled";

/// Optional header naming the principal instead of the resolved host.
pub const USERNAME_HEADER: &str = "Username";

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error(
        "modifying white-listed hosts is not permitted; enable it via {} in your configuration",
        WHITELIST_MODIFICATION_ENABLED_KEY
    )]
    ModificationDisabled,

    #[error("invalid host pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Pre-authenticated identity minted for a whitelisted peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub host: HostName,
}

struct CompiledWhitelist {
    raw: String,
    patterns: Vec<Regex>,
}

/// Grants identities to requests originating from trusted hosts.
///
/// A request carrying an `Authorization` header is never handled here —
/// it defers to downstream authenticators. Membership is any-of over the
/// compiled pattern set; the set is replaced atomically by
/// [`set_whitelisted_hosts`](WhitelistAuthenticationFilter::set_whitelisted_hosts)
/// and no lock is held while matching.
pub struct WhitelistAuthenticationFilter {
    whitelist: RwLock<Arc<CompiledWhitelist>>,
    modification_enabled: bool,
    resolver: Arc<dyn HostnameResolver>,
}

impl WhitelistAuthenticationFilter {
    /// Compile `hosts` (comma-delimited wildcard patterns, whitespace
    /// ignored) into the active whitelist.
    pub fn new(
        hosts: &str,
        modification_enabled: bool,
        resolver: Arc<dyn HostnameResolver>,
    ) -> Result<Self, SecurityError> {
        Ok(WhitelistAuthenticationFilter {
            whitelist: RwLock::new(Arc::new(compile(hosts)?)),
            modification_enabled,
            resolver,
        })
    }

    pub fn from_config(
        config: &rpmdepot_core::Config,
        resolver: Arc<dyn HostnameResolver>,
    ) -> Result<Self, SecurityError> {
        Self::new(
            &config.whitelist_hosts,
            config.whitelist_modification_enabled,
            resolver,
        )
    }

    /// Identity for a pre-authenticated request, or `None` to defer.
    ///
    /// A whitelisted peer is granted an identity named by the `Username`
    /// header when present, else by the resolved host name.
    pub fn resolve_principal(&self, headers: &HeaderMap, peer: IpAddr) -> Option<Principal> {
        if headers.contains_key(AUTHORIZATION) {
            return None;
        }
        let host = self.resolver.resolve(peer);
        if !self.is_whitelisted(&host) {
            tracing::debug!(%host, "host is not a white-listed host");
            return None;
        }
        let username = headers
            .get(USERNAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| host.name().to_string());
        Some(Principal { username, host })
    }

    /// The resolved host name, present only when the peer is whitelisted.
    pub fn resolve_credentials(&self, peer: IpAddr) -> Option<HostName> {
        let host = self.resolver.resolve(peer);
        self.is_whitelisted(&host).then_some(host)
    }

    /// The raw comma-delimited pattern list currently in force.
    pub fn whitelisted_hosts(&self) -> String {
        self.current().raw.clone()
    }

    /// Replace the active pattern set.
    ///
    /// Refused unless modification was enabled at construction. The swap
    /// is atomic: concurrent matchers observe either the old or the new
    /// set, never a partially built one.
    pub fn set_whitelisted_hosts(&self, hosts: &str) -> Result<(), SecurityError> {
        if !self.modification_enabled {
            return Err(SecurityError::ModificationDisabled);
        }
        let compiled = Arc::new(compile(hosts)?);
        let mut guard = self.whitelist.write().unwrap_or_else(|e| e.into_inner());
        *guard = compiled;
        Ok(())
    }

    fn current(&self) -> Arc<CompiledWhitelist> {
        self.whitelist
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn is_whitelisted(&self, host: &HostName) -> bool {
        let whitelist = self.current();
        whitelist
            .patterns
            .iter()
            .any(|pattern| pattern.is_match(host.name()))
    }
}

fn compile(hosts: &str) -> Result<CompiledWhitelist, SecurityError> {
    let trimmed: String = hosts.chars().filter(|c| !c.is_whitespace()).collect();
    let mut seen = BTreeSet::new();
    let mut patterns = Vec::new();
    for entry in trimmed.split(',') {
        if entry.is_empty() || !seen.insert(entry) {
            continue;
        }
        patterns.push(wildcard_to_regex(entry)?);
    }
    tracing::debug!(raw = %hosts, patterns = patterns.len(), "compiled whitelist");
    Ok(CompiledWhitelist {
        raw: hosts.to_string(),
        patterns,
    })
}
