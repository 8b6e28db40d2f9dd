use std::net::IpAddr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use tracing::warn;

/// IP allowlist: exact addresses or CIDR ranges. Malformed entries are
/// rejected at construction time (logged and skipped) rather than being
/// allowed to silently match everything.
pub struct Allowlist {
    entries: Vec<IpNetwork>,
}

impl Allowlist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for raw in entries {
            match parse_entry(raw.as_ref()) {
                Some(net) => parsed.push(net),
                None => warn!(entry = raw.as_ref(), "skipping malformed allowlist entry"),
            }
        }
        Self { entries: parsed }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `ip` (after IPv4-mapped-IPv6 normalization) matches any
    /// configured exact address or CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = normalize(*ip);
        self.entries.iter().any(|net| net.contains(ip))
    }
}

/// Collapses an IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) to its IPv4
/// form so allowlist entries only need to be written once.
pub fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

fn parse_entry(raw: &str) -> Option<IpNetwork> {
    if let Ok(net) = raw.parse::<IpNetwork>() {
        return Some(net);
    }
    match raw.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(IpNetwork::V4(Ipv4Network::new(v4, 32).ok()?)),
        IpAddr::V6(v6) => Some(IpNetwork::V6(Ipv6Network::new(v6, 128).ok()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ip_matches_only_itself() {
        let list = Allowlist::new(["10.0.0.1"]);
        assert!(list.contains(&"10.0.0.1".parse().unwrap()));
        assert!(!list.contains(&"10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn cidr_matches_whole_range() {
        let list = Allowlist::new(["10.0.0.0/24"]);
        assert!(list.contains(&"10.0.0.200".parse().unwrap()));
        assert!(!list.contains(&"10.0.1.1".parse().unwrap()));
    }

    #[test]
    fn zero_slash_zero_blocks_every_ipv4() {
        let list = Allowlist::new(["0.0.0.0/0"]);
        assert!(list.contains(&"1.2.3.4".parse().unwrap()));
        assert!(list.contains(&"255.255.255.255".parse().unwrap()));
    }

    #[test]
    fn malformed_cidr_is_skipped_and_never_matches() {
        let list = Allowlist::new(["foo/0"]);
        assert!(list.is_empty());
        assert!(!list.contains(&"1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn ipv4_mapped_ipv6_normalizes_before_matching() {
        let list = Allowlist::new(["10.0.0.1"]);
        let mapped: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert!(list.contains(&mapped));
    }
}
