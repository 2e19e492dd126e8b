//! Canonical host names for request peers.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Canonical name of a request peer, comparable to whitelist patterns as
/// a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostName(String);

impl HostName {
    pub fn new(name: impl Into<String>) -> Self {
        HostName(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for HostName {
    fn from(addr: IpAddr) -> Self {
        HostName(addr.to_string())
    }
}

/// Maps a peer address to its canonical host name. The returned name must
/// be stable for the lifetime of a request.
pub trait HostnameResolver: Send + Sync {
    fn resolve(&self, addr: IpAddr) -> HostName;
}

/// Reverse DNS with forward confirmation.
///
/// The reverse lookup's candidate name is accepted only when a forward
/// lookup of that name yields the original address again; otherwise, and
/// whenever either lookup fails, the numeric address is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsHostnameResolver;

impl HostnameResolver for DnsHostnameResolver {
    fn resolve(&self, addr: IpAddr) -> HostName {
        match dns_lookup::lookup_addr(&addr) {
            Ok(candidate) => {
                let confirmed = dns_lookup::lookup_host(&candidate)
                    .map(|addresses| addresses.contains(&addr))
                    .unwrap_or(false);
                if confirmed {
                    HostName(candidate)
                } else {
                    tracing::debug!(
                        %addr,
                        %candidate,
                        "reverse lookup not forward-confirmed, using numeric address"
                    );
                    HostName::from(addr)
                }
            }
            Err(error) => {
                tracing::debug!(%addr, %error, "reverse lookup failed, using numeric address");
                HostName::from(addr)
            }
        }
    }
}

/// Table-driven resolver for tests and fleets with fixed addressing.
/// Unknown addresses fall back to their numeric form.
#[derive(Debug, Clone, Default)]
pub struct StaticHostnameResolver {
    hosts: HashMap<IpAddr, String>,
}

impl StaticHostnameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, addr: IpAddr, name: impl Into<String>) -> Self {
        self.hosts.insert(addr, name.into());
        self
    }
}

impl HostnameResolver for StaticHostnameResolver {
    fn resolve(&self, addr: IpAddr) -> HostName {
        match self.hosts.get(&addr) {
            Some(name) => HostName(name.clone()),
            None => HostName::from(addr),
        }
    }
}
