//! Server address resolution and the round-robin candidate cache.

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use tracing::debug;

/// Resolves a host name to IP addresses.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 0).to_socket_addrs()?.map(|a| a.ip()).collect())
    }
}

/// Resolver returning a fixed address list for every host.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    addresses: Vec<IpAddr>,
}

impl StaticResolver {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        StaticResolver { addresses }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        Ok(self.addresses.clone())
    }
}

/// Expands resolved addresses into connect candidates.
///
/// IPv6 addresses sort first, then by textual form. Each address yields
/// the primary port followed by the alternate port.
pub fn candidate_addresses(mut ips: Vec<IpAddr>, port: u16, alt_port: u16) -> Vec<SocketAddr> {
    ips.sort_by(|a, b| {
        b.is_ipv6()
            .cmp(&a.is_ipv6())
            .then_with(|| a.to_string().cmp(&b.to_string()))
    });
    ips.dedup();
    ips.into_iter()
        .flat_map(|ip| [SocketAddr::new(ip, port), SocketAddr::new(ip, alt_port)])
        .collect()
}

/// Cached candidate list with a round-robin cursor.
#[derive(Debug, Default)]
pub struct AddressCache {
    addresses: Vec<SocketAddr>,
    index: usize,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list only if it differs; the cursor then restarts.
    ///
    /// Returns true if the list was replaced.
    pub fn update(&mut self, addresses: Vec<SocketAddr>) -> bool {
        if addresses == self.addresses {
            return false;
        }
        debug!(count = addresses.len(), "Server address list changed");
        self.addresses = addresses;
        self.index = 0;
        true
    }

    pub fn current(&self) -> Option<SocketAddr> {
        self.addresses.get(self.index).copied()
    }

    /// Moves the cursor to the next candidate, wrapping around.
    pub fn advance(&mut self) {
        if !self.addresses.is_empty() {
            self.index = (self.index + 1) % self.addresses.len();
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_candidates_ipv6_first_with_both_ports() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let candidates = candidate_addresses(vec![v4(2), v6, v4(1)], 5222, 443);
        assert_eq!(
            candidates,
            vec![
                SocketAddr::new(v6, 5222),
                SocketAddr::new(v6, 443),
                SocketAddr::new(v4(1), 5222),
                SocketAddr::new(v4(1), 443),
                SocketAddr::new(v4(2), 5222),
                SocketAddr::new(v4(2), 443),
            ]
        );
    }

    #[test]
    fn test_cache_keeps_cursor_when_unchanged() {
        let mut cache = AddressCache::new();
        assert!(cache.update(candidate_addresses(vec![v4(1)], 1, 2)));
        cache.advance();
        assert_eq!(cache.index(), 1);

        assert!(!cache.update(candidate_addresses(vec![v4(1)], 1, 2)));
        assert_eq!(cache.index(), 1);

        assert!(cache.update(candidate_addresses(vec![v4(3)], 1, 2)));
        assert_eq!(cache.index(), 0);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut cache = AddressCache::new();
        cache.update(candidate_addresses(vec![v4(1)], 1, 2));
        cache.advance();
        cache.advance();
        assert_eq!(cache.current(), Some(SocketAddr::new(v4(1), 1)));
    }

    #[test]
    fn test_empty_cache() {
        let mut cache = AddressCache::new();
        cache.advance();
        assert_eq!(cache.current(), None);
        assert!(cache.is_empty());
    }
}
