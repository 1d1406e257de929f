//! IPv4 pool arithmetic shared by the allocators and the validator.
//!
//! Pools are plain `Ipv4Net` values; counts are returned as `u64` so a /0
//! never overflows.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Prefix length of a point-to-point link block
pub const LINK_BLOCK_PREFIX: u8 = 31;

/// Number of addresses covered by `net`
pub fn size(net: &Ipv4Net) -> u64 {
    1u64 << (32 - u32::from(net.prefix_len()))
}

/// Number of addresses `Ipv4Net::hosts` yields for a loopback pool.
/// /31 and /32 pools count every address (RFC 3021 semantics).
pub fn host_count(net: &Ipv4Net) -> u64 {
    match net.prefix_len() {
        31 | 32 => size(net),
        _ => size(net) - 2,
    }
}

/// True when `addr` is one of the addresses `Ipv4Net::hosts` would yield
pub fn is_host_of(net: &Ipv4Net, addr: Ipv4Addr) -> bool {
    if !net.contains(&addr) {
        return false;
    }
    net.prefix_len() >= 31 || (addr != net.network() && addr != net.broadcast())
}

/// Number of /31 blocks that fit in `net`
pub fn block_count(net: &Ipv4Net) -> u64 {
    if net.prefix_len() > LINK_BLOCK_PREFIX {
        0
    } else {
        size(net) / 2
    }
}

/// The aligned /31 block holding `addr`
pub fn block_of(addr: Ipv4Addr) -> Ipv4Net {
    // LINK_BLOCK_PREFIX is a valid IPv4 prefix length
    Ipv4Net::new(addr, LINK_BLOCK_PREFIX)
        .map(|net| net.trunc())
        .unwrap_or_else(|_| Ipv4Net::from(addr))
}

/// First host of a tenant subnet, used as its gateway.
///
/// Tenant subnets must leave room for end hosts besides the gateway, so /31
/// and /32 subnets have no usable host here.
pub fn first_usable_host(net: &Ipv4Net) -> Option<Ipv4Addr> {
    if net.prefix_len() > 30 {
        return None;
    }
    Some(Ipv4Addr::from(u32::from(net.network()) + 1))
}

/// True when `addr` is a usable (non-network, non-broadcast) host of a tenant subnet
pub fn is_usable_host(net: &Ipv4Net, addr: Ipv4Addr) -> bool {
    net.prefix_len() <= 30
        && net.contains(&addr)
        && addr != net.network()
        && addr != net.broadcast()
}

/// True when two prefixes share at least one address
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
