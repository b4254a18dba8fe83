//! Relay address classification.
//!
//! TURN relays reach the filter from private, loopback or link-local
//! addresses. Those are always allowed and never looked up.

use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Operator-configured relay entry (single address or CIDR block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEntry {
    Single(IpAddr),
    Network(IpNet),
}

impl RelayEntry {
    /// Parse a single address or CIDR network.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(ip) = s.parse::<IpAddr>() {
            Some(RelayEntry::Single(canonical(ip)))
        } else if let Ok(net) = s.parse::<IpNet>() {
            Some(RelayEntry::Network(net))
        } else {
            None
        }
    }

    /// Check if an IP address matches this entry.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match self {
            RelayEntry::Single(addr) => addr == ip,
            RelayEntry::Network(net) => net.contains(ip),
        }
    }
}

/// Unwrap IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) to their IPv4 form.
pub fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Private, loopback, link-local unicast or link-local multicast.
pub fn is_relay_address(ip: &IpAddr) -> bool {
    match canonical(*ip) {
        IpAddr::V4(v4) => is_relay_v4(&v4),
        IpAddr::V6(v6) => is_relay_v6(&v6),
    }
}

fn is_relay_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        // 224.0.0.0/24
        || (octets[0] == 224 && octets[1] == 0 && octets[2] == 0)
}

fn is_relay_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
        // ffX2::/16, any flags
        || (first & 0xff0f) == 0xff02
}
