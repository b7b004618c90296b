//! Network-namespace id allocation and port planning for the start flow.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{utils::ip_add, VirtnodeError, VirtnodeResult};

use super::models::VmNetworkPort;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The prefix of the network namespaces managed by this agent.
pub const NETNS_PREFIX: &str = "com-";

/// The number of assignable namespace ids.
pub const NETNS_ID_COUNT: usize = 4096;

/// The first per-port gateway address inside a namespace.
pub const NETNS_GATEWAY_START_IP: Ipv4Addr = Ipv4Addr::new(169, 254, 1, 1);

/// The first namespace-side link-local address.
pub const NETNS_START_IP: Ipv4Addr = Ipv4Addr::new(169, 254, 32, 1);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Host introspection for network namespaces.
#[async_trait]
pub trait NetnsHost {
    /// Lists the names of the network namespaces currently active on the
    /// host.
    async fn list_netns_names(&self) -> VirtnodeResult<HashSet<String>>;
}

/// A [`NetnsHost`] that shells out to `ip netns`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpCommandNetnsHost;

/// Hands out namespace ids that are unused on the host.
///
/// Ids are small integers in `0..4096`; the used set is seeded from the
/// host's existing namespaces named `com-<id>`.
#[derive(Debug, Clone)]
pub struct NetnsIdAllocator {
    used: Vec<bool>,
}

/// The planned namespace wiring for one VM network port.
#[derive(Debug, Clone, PartialEq)]
pub struct NetnsPortPlan {
    /// The assigned namespace id.
    pub id: u32,

    /// The namespace name, `com-<id>`.
    pub name: String,

    /// The gateway address inside the namespace for this port.
    pub netns_gateway: String,

    /// The namespace-side link-local address, derived from the id.
    pub netns_ip: String,

    /// The port's assigned VM-side IP address.
    pub vm_ip: String,

    /// The port's assigned VM-side MAC address.
    pub vm_mac: String,

    /// The subnet of the port's network.
    pub vm_subnet: String,

    /// The kind of the port's network.
    pub kind: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NetnsIdAllocator {
    /// Builds an allocator seeded from the host's active namespaces.
    pub async fn detect(host: &impl NetnsHost) -> VirtnodeResult<Self> {
        let names = host.list_netns_names().await?;
        Ok(Self::from_names(&names))
    }

    /// Builds an allocator from a set of namespace names.
    ///
    /// Only names of the form `com-<id>` with `id < 4096` occupy an id;
    /// anything else is ignored.
    pub fn from_names(names: &HashSet<String>) -> Self {
        let mut used = vec![false; NETNS_ID_COUNT];
        for name in names {
            let Some(suffix) = name.strip_prefix(NETNS_PREFIX) else {
                continue;
            };
            if let Some(id) = suffix.parse::<usize>().ok().filter(|id| *id < NETNS_ID_COUNT) {
                used[id] = true;
            }
        }
        Self { used }
    }

    /// Returns the lowest unused id and marks it used.
    pub fn allocate(&mut self) -> Option<u32> {
        let id = self.used.iter().position(|used| !used)?;
        self.used[id] = true;
        Some(id as u32)
    }

    /// Returns true if the id is already in use.
    pub fn is_used(&self, id: u32) -> bool {
        self.used.get(id as usize).copied().unwrap_or(true)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Plans the namespace wiring for a VM's assigned ports.
///
/// Each port gets its own namespace id; the namespace-side address is derived
/// from the id and the in-namespace gateway from the port's position.
pub fn plan_netns_ports(
    allocator: &mut NetnsIdAllocator,
    ports: &[VmNetworkPort],
) -> VirtnodeResult<Vec<NetnsPortPlan>> {
    let gateway_start = IpAddr::V4(NETNS_GATEWAY_START_IP);
    let netns_start = IpAddr::V4(NETNS_START_IP);

    let mut plans = Vec::with_capacity(ports.len());
    for (index, port) in ports.iter().enumerate() {
        let id = allocator.allocate().ok_or_else(|| {
            VirtnodeError::bad_input("network namespace ids are exhausted".to_string())
        })?;

        plans.push(NetnsPortPlan {
            id,
            name: format!("{}{}", NETNS_PREFIX, id),
            netns_gateway: ip_add(&gateway_start, index as u32).to_string(),
            netns_ip: ip_add(&netns_start, id).to_string(),
            vm_ip: port.port.ip.clone(),
            vm_mac: port.port.mac.clone(),
            vm_subnet: port.subnet.clone(),
            kind: port.network_kind.clone(),
        });
    }

    Ok(plans)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl NetnsHost for IpCommandNetnsHost {
    async fn list_netns_names(&self) -> VirtnodeResult<HashSet<String>> {
        let output = Command::new("ip").arg("netns").output().await?;
        if !output.status.success() {
            return Err(VirtnodeError::Custom(anyhow::anyhow!(
                "ip netns failed: status={}, stderr={}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // Each line is "<name> (id: <n>)"; only the name matters.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let names = stdout
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| line.split_whitespace().next())
            .map(|name| name.to_string())
            .collect();

        Ok(names)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::models::NetworkPort;

    struct FakeHost {
        names: HashSet<String>,
    }

    #[async_trait]
    impl NetnsHost for FakeHost {
        async fn list_netns_names(&self) -> VirtnodeResult<HashSet<String>> {
            Ok(self.names.clone())
        }
    }

    fn port(ip: &str, mac: &str) -> VmNetworkPort {
        VmNetworkPort {
            port: NetworkPort {
                id: 1,
                network_id: 1,
                vm_id: 1,
                ip: ip.to_string(),
                mac: mac.to_string(),
            },
            network_name: "net0".to_string(),
            network_kind: "local".to_string(),
            subnet: "10.0.0.0/24".to_string(),
            gateway: "10.0.0.1".to_string(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_detect_skips_used_and_foreign_names() {
        let names: HashSet<String> = ["com-0", "com-2", "qemu-7", "com-9999999", "com-abc"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut allocator = NetnsIdAllocator::detect(&FakeHost { names }).await.unwrap();

        assert!(allocator.is_used(0));
        assert!(allocator.is_used(2));
        assert!(!allocator.is_used(7));

        assert_eq!(allocator.allocate(), Some(1));
        assert_eq!(allocator.allocate(), Some(3));
    }

    #[test]
    fn test_allocator_exhausts() {
        let mut allocator = NetnsIdAllocator::from_names(&HashSet::new());
        for _ in 0..NETNS_ID_COUNT {
            assert!(allocator.allocate().is_some());
        }
        assert_eq!(allocator.allocate(), None);
    }

    #[test]
    fn test_plan_derives_link_local_addresses() {
        let names: HashSet<String> = ["com-0"].iter().map(|s| s.to_string()).collect();
        let mut allocator = NetnsIdAllocator::from_names(&names);

        let ports = vec![
            port("10.0.0.10", "02:00:00:00:00:01"),
            port("10.0.0.11", "02:00:00:00:00:02"),
        ];
        let plans = plan_netns_ports(&mut allocator, &ports).unwrap();

        assert_eq!(plans.len(), 2);

        assert_eq!(plans[0].id, 1);
        assert_eq!(plans[0].name, "com-1");
        assert_eq!(plans[0].netns_gateway, "169.254.1.1");
        assert_eq!(plans[0].netns_ip, "169.254.32.2");
        assert_eq!(plans[0].vm_ip, "10.0.0.10");

        assert_eq!(plans[1].id, 2);
        assert_eq!(plans[1].name, "com-2");
        assert_eq!(plans[1].netns_gateway, "169.254.1.2");
        assert_eq!(plans[1].netns_ip, "169.254.32.3");
    }
}
