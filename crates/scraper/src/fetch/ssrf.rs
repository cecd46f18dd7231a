//! SSRF (Server-Side Request Forgery) protection.
//!
//! Career-page URLs arrive from external callers, so every fetch target is
//! checked against private/internal addresses and cloud metadata hosts
//! before a request is made.

use ipnet::Ipv4Net;
use std::net::IpAddr;
use std::sync::LazyLock;

/// URL schemes that must never be fetched.
pub const DENIED_SCHEMES: &[&str] = &["file", "ftp", "data", "javascript", "chrome", "about", "blob", "ws", "wss"];

/// Hostnames that resolve to instance metadata or loopback regardless of DNS.
const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.gke.internal",
    "instance-data",
];

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked scheme: {0}")]
    BlockedScheme(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),
}

/// IPv4 ranges the std predicates miss: CGNAT, benchmarking, and the
/// reserved 240/4 block.
static EXTRA_BLOCKED_V4: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    ["100.64.0.0/10", "198.18.0.0/15", "240.0.0.0/4"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// Covers loopback, RFC 1918, link-local (including the 169.254.169.254
/// metadata endpoint), multicast, unspecified, CGNAT, and IPv6
/// unique-local ranges.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
                || EXTRA_BLOCKED_V4.iter().any(|net| net.contains(&v4))
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate a URL against scheme, hostname, and literal-IP rules.
///
/// DNS-resolved addresses are checked separately by the fetch layer; this
/// is the cheap, pre-resolution gate.
pub fn validate_url(url: &url::Url) -> Result<(), SsrfError> {
    if DENIED_SCHEMES.contains(&url.scheme()) {
        return Err(SsrfError::BlockedScheme(url.scheme().to_string()));
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if BLOCKED_HOSTS.contains(&lowered.as_str()) {
            return Err(SsrfError::BlockedHost(lowered));
        }
    }

    if let Some(url::Host::Ipv4(v4)) = url.host() {
        validate_ip(IpAddr::V4(v4))?;
    }
    if let Some(url::Host::Ipv6(v6)) = url.host() {
        validate_ip(IpAddr::V6(v6))?;
    }

    Ok(())
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}
