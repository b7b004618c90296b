//! Network spec types and address-geometry parsing.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::{
    utils::{available_ip_count, compare_ip},
    VirtnodeError, VirtnodeResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The declarative spec for a network resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// The name of the network, unique among active rows within a namespace.
    pub name: String,

    /// The namespace the network belongs to.
    pub namespace: String,

    /// The subnet in CIDR notation.
    pub subnet: String,

    /// The first address of the allocatable range.
    pub start_ip: String,

    /// The end of the allocatable range (exclusive).
    pub end_ip: String,

    /// The gateway address.
    pub gateway: String,

    /// The kind-specific payload.
    #[serde(flatten)]
    pub kind: NetworkKind,
}

/// The kind-discriminated payload of a network spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NetworkKind {
    /// A node-local network.
    Local(NetworkLocalSpec),
}

/// Payload for `local` networks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkLocalSpec {
    /// The DNS resolvers advertised to ports on this network.
    #[serde(default)]
    pub resolvers: Vec<Resolver>,

    /// The NAT policy for this network.
    #[serde(default)]
    pub nat: NetworkNat,
}

/// A single DNS resolver entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolver {
    /// The resolver address.
    pub resolver: String,
}

/// NAT policy for a local network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkNat {
    /// Whether NAT is enabled.
    #[serde(default)]
    pub enable: bool,

    /// The port ranges forwarded through NAT.
    #[serde(default)]
    pub ports: String,
}

/// An ephemeral request used to resolve a symbolic network name into concrete
/// candidate networks during one orchestration call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDetectSpec {
    /// The name the candidate networks must carry.
    pub name: String,
}

/// The parsed address geometry of a network spec. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNetwork {
    /// The parsed subnet.
    pub subnet: IpNetwork,

    /// The parsed gateway address.
    pub gateway: IpAddr,

    /// The parsed start of the allocatable range.
    pub start_ip: IpAddr,

    /// The parsed end of the allocatable range.
    pub end_ip: IpAddr,

    /// The number of allocatable addresses, before subtracting assigned ports.
    pub available_ips: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NetworkSpec {
    /// Parses and checks the spec's address geometry.
    ///
    /// Fails with a bad-input error if any field does not parse, if the
    /// subnet does not contain the gateway or the allocatable range, or if
    /// `start_ip` does not strictly precede `end_ip`.
    pub fn parse_geometry(&self) -> VirtnodeResult<ParsedNetwork> {
        let subnet: IpNetwork = self.subnet.parse().map_err(|_| {
            VirtnodeError::bad_input(format!("invalid subnet: subnet={}", self.subnet))
        })?;

        let gateway: IpAddr = self.gateway.parse().map_err(|_| {
            VirtnodeError::bad_input(format!("invalid gateway: gateway={}", self.gateway))
        })?;

        let start_ip: IpAddr = self.start_ip.parse().map_err(|_| {
            VirtnodeError::bad_input(format!("invalid start_ip: start_ip={}", self.start_ip))
        })?;

        let end_ip: IpAddr = self.end_ip.parse().map_err(|_| {
            VirtnodeError::bad_input(format!("invalid end_ip: end_ip={}", self.end_ip))
        })?;

        if !subnet.contains(start_ip) {
            return Err(VirtnodeError::bad_input(format!(
                "start_ip is not in subnet: start_ip={}, subnet={}",
                self.start_ip, self.subnet
            )));
        }

        if !subnet.contains(end_ip) {
            return Err(VirtnodeError::bad_input(format!(
                "end_ip is not in subnet: end_ip={}, subnet={}",
                self.end_ip, self.subnet
            )));
        }

        if !subnet.contains(gateway) {
            return Err(VirtnodeError::bad_input(format!(
                "gateway is not in subnet: gateway={}, subnet={}",
                self.gateway, self.subnet
            )));
        }

        if compare_ip(&start_ip, &end_ip) != std::cmp::Ordering::Less {
            return Err(VirtnodeError::bad_input(format!(
                "start_ip must precede end_ip: start_ip={}, end_ip={}",
                self.start_ip, self.end_ip
            )));
        }

        let available_ips = available_ip_count(&start_ip, &end_ip);

        Ok(ParsedNetwork {
            subnet,
            gateway,
            start_ip,
            end_ip,
            available_ips,
        })
    }
}

impl NetworkKind {
    /// Returns the kind discriminator stored in the `kind` column.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
        }
    }

    /// Serializes the kind payload to its canonical JSON form.
    pub fn payload_json(&self) -> VirtnodeResult<String> {
        match self {
            Self::Local(spec) => Ok(serde_json::to_string(spec)?),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(subnet: &str, start_ip: &str, end_ip: &str, gateway: &str) -> NetworkSpec {
        NetworkSpec {
            name: "net0".to_string(),
            namespace: "default".to_string(),
            subnet: subnet.to_string(),
            start_ip: start_ip.to_string(),
            end_ip: end_ip.to_string(),
            gateway: gateway.to_string(),
            kind: NetworkKind::Local(NetworkLocalSpec::default()),
        }
    }

    #[test]
    fn test_parse_geometry_computes_available_ips() {
        let parsed = spec("10.0.0.0/24", "10.0.0.10", "10.0.0.20", "10.0.0.1")
            .parse_geometry()
            .unwrap();

        assert_eq!(parsed.available_ips, 10);
        assert_eq!(parsed.start_ip, "10.0.0.10".parse::<IpAddr>().unwrap());
        assert_eq!(parsed.end_ip, "10.0.0.20".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_geometry_rejects_reversed_range() {
        let err = spec("10.0.0.0/24", "10.0.0.20", "10.0.0.10", "10.0.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_parse_geometry_rejects_equal_start_and_end() {
        let err = spec("10.0.0.0/24", "10.0.0.10", "10.0.0.10", "10.0.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_parse_geometry_rejects_addresses_outside_subnet() {
        let err = spec("10.0.0.0/24", "10.0.1.10", "10.0.0.20", "10.0.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());

        let err = spec("10.0.0.0/24", "10.0.0.10", "10.0.0.20", "192.168.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_parse_geometry_rejects_malformed_fields() {
        let err = spec("not-a-subnet", "10.0.0.10", "10.0.0.20", "10.0.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());

        let err = spec("10.0.0.0/24", "not-an-ip", "10.0.0.20", "10.0.0.1")
            .parse_geometry()
            .unwrap_err();
        assert!(err.is_bad_input());
    }
}
