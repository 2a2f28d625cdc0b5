//! Deterministic session identifiers derived from backend addresses.
//!
//! A session id is a pure function of the instance's IP address: the same
//! address always yields the same id, and distinct addresses yield distinct
//! ids. No state, no randomness.

use std::net::IpAddr;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Derive the stable session id for a backend address.
///
/// IPv6 octets fill the UUID directly; IPv4 addresses go through their
/// v4-mapped IPv6 form (`::ffff:a.b.c.d`) so the two families can never
/// collide.
pub fn session_id(addr: IpAddr) -> Uuid {
    let octets = match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    Uuid::from_bytes(octets)
}

/// Parse a textual address and derive its session id.
///
/// Fails with [`Error::AddressConversion`] when the string is not a valid
/// IP address.
pub fn session_id_for(address: &str) -> Result<Uuid> {
    let ip: IpAddr = address.parse().map_err(|_| Error::AddressConversion {
        address: address.to_string(),
    })?;
    Ok(session_id(ip))
}
