//! Pure address math over IP byte sequences plus MAC address generation.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use rand::Rng;

use crate::{VirtnodeError, VirtnodeResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Compares two IP addresses byte-wise over their octets.
///
/// Returns `Ordering::Equal` iff the addresses are byte-equal. Addresses of
/// different families order IPv4 before IPv6.
pub fn compare_ip(a: &IpAddr, b: &IpAddr) -> Ordering {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => a.octets().cmp(&b.octets()),
        (IpAddr::V6(a), IpAddr::V6(b)) => a.octets().cmp(&b.octets()),
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
    }
}

/// Increments an IP address by one, carrying across octets.
///
/// The all-ones address wraps around to the all-zeros address of the same
/// family.
pub fn increment_ip(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            for octet in octets.iter_mut().rev() {
                *octet = octet.wrapping_add(1);
                if *octet != 0 {
                    break;
                }
            }
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            for octet in octets.iter_mut().rev() {
                *octet = octet.wrapping_add(1);
                if *octet != 0 {
                    break;
                }
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    }
}

/// Returns the big-endian integer value of an IP address's octets.
pub fn ip_to_int(ip: &IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u32::from(*v4) as u128,
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

/// Adds an integer offset to an IP address, wrapping within the address
/// family.
pub fn ip_add(ip: &IpAddr, offset: u32) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(u32::from(*v4).wrapping_add(offset))),
        IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(
            u128::from(*v6).wrapping_add(offset as u128),
        )),
    }
}

/// Counts the addresses available between `start` (inclusive) and `end`
/// (exclusive), saturating at `u64::MAX` for ranges wider than that.
pub fn available_ip_count(start: &IpAddr, end: &IpAddr) -> u64 {
    let count = ip_to_int(end).saturating_sub(ip_to_int(start));
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Generates a random locally-administered MAC address.
///
/// The first octet is fixed to 0x02 so generated addresses never collide with
/// vendor-assigned ones.
pub fn generate_random_mac() -> String {
    let buf: [u8; 5] = rand::thread_rng().gen();
    format!(
        "02:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        buf[0], buf[1], buf[2], buf[3], buf[4]
    )
}

/// Generates a random MAC address that is not present in `used`, retrying up
/// to `limit` times.
pub fn generate_unique_random_mac(used: &HashSet<String>, limit: usize) -> VirtnodeResult<String> {
    generate_unique_mac_with(generate_random_mac, used, limit)
}

/// Like [`generate_unique_random_mac`] but with an injectable generator, so
/// the retry bound can be exercised deterministically.
pub fn generate_unique_mac_with(
    mut gen: impl FnMut() -> String,
    used: &HashSet<String>,
    limit: usize,
) -> VirtnodeResult<String> {
    for _ in 0..limit {
        let mac = gen();
        if !used.contains(&mac) {
            return Ok(mac);
        }
    }

    Err(VirtnodeError::bad_input(format!(
        "failed to generate mac: exceeded limit {}",
        limit
    )))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
