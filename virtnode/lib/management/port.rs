use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use sqlx::{Row, SqliteConnection};

use crate::{
    config::NetworkDetectSpec,
    utils::{available_ip_count, compare_ip, generate_unique_random_mac, increment_ip},
    VirtnodeError, VirtnodeResult,
};

use super::{
    models::{Network, NetworkPort},
    VirtController,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The maximum number of attempts when sampling an unused MAC address.
pub const MAC_GENERATION_LIMIT: usize = 100;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A candidate network with its parsed allocatable range.
struct Candidate {
    id: i64,
    name: String,
    start_ip: IpAddr,
    end_ip: IpAddr,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtController {
    /// Allocates one network port per detect spec for a VM, inside the
    /// caller's transaction.
    ///
    /// For each request the candidate networks are the active networks whose
    /// name matches; the candidate with the most addresses left wins, with
    /// the first-listed candidate breaking ties. IPs are scanned upward from
    /// the network's start address and MACs are sampled randomly, both
    /// against in-memory used sets seeded from the store, so two requests in
    /// the same call cannot collide before the transaction commits.
    ///
    /// Any failure leaves no ports behind; the caller's rollback discards the
    /// inserts.
    pub(crate) async fn assign_network_ports(
        &self,
        conn: &mut SqliteConnection,
        vm_id: i64,
        detect_specs: &[NetworkDetectSpec],
    ) -> VirtnodeResult<Vec<NetworkPort>> {
        if detect_specs.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT * FROM networks WHERE deleted_at IS NULL ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        let networks: Vec<Network> = rows.iter().map(Network::from_row).collect();

        // Resolve each symbolic request into concrete candidate network ids.
        let mut candidate_ids_per_spec: Vec<Vec<i64>> = Vec::with_capacity(detect_specs.len());
        let mut candidates: HashMap<i64, Candidate> = HashMap::new();

        for detect_spec in detect_specs {
            let mut ids = Vec::new();
            for network in networks.iter().filter(|n| n.name == detect_spec.name) {
                ids.push(network.id);
                if !candidates.contains_key(&network.id) {
                    candidates.insert(network.id, Candidate::parse(network)?);
                }
            }
            if ids.is_empty() {
                return Err(VirtnodeError::bad_input(format!(
                    "candidate network is not found: name={}",
                    detect_spec.name
                )));
            }
            candidate_ids_per_spec.push(ids);
        }

        // Seed the per-network used sets from every port already assigned on
        // any candidate network.
        let mut used_ips: HashMap<i64, HashSet<String>> = HashMap::new();
        let mut used_macs: HashMap<i64, HashSet<String>> = HashMap::new();

        let network_ids: Vec<i64> = candidates.keys().copied().collect();
        let placeholders = vec!["?"; network_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM network_ports WHERE deleted_at IS NULL AND network_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in &network_ids {
            query = query.bind(id);
        }
        let port_rows = query.fetch_all(&mut *conn).await?;

        for row in &port_rows {
            let port = NetworkPort::from_row(row);
            used_ips.entry(port.network_id).or_default().insert(port.ip);
            used_macs
                .entry(port.network_id)
                .or_default()
                .insert(port.mac);
        }

        // Allocate against the in-memory sets.
        let mut assigned_ports = Vec::with_capacity(detect_specs.len());
        for ids in &candidate_ids_per_spec {
            let chosen = choose_candidate(ids, &candidates, &used_ips);

            let ips = used_ips.entry(chosen.id).or_default();
            let mut candidate_ip = chosen.start_ip;
            loop {
                if compare_ip(&candidate_ip, &chosen.end_ip) != Ordering::Less {
                    return Err(VirtnodeError::bad_input(format!(
                        "network address range is exhausted: name={}",
                        chosen.name
                    )));
                }
                if !ips.contains(&candidate_ip.to_string()) {
                    break;
                }
                candidate_ip = increment_ip(&candidate_ip);
            }
            let ip = candidate_ip.to_string();
            ips.insert(ip.clone());

            let macs = used_macs.entry(chosen.id).or_default();
            let mac = generate_unique_random_mac(macs, MAC_GENERATION_LIMIT)?;
            macs.insert(mac.clone());

            assigned_ports.push(NetworkPort {
                id: 0,
                network_id: chosen.id,
                vm_id,
                ip,
                mac,
            });
        }

        for port in &mut assigned_ports {
            let row = sqlx::query(
                r#"
                INSERT INTO network_ports (network_id, vm_id, ip, mac)
                VALUES (?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(port.network_id)
            .bind(port.vm_id)
            .bind(&port.ip)
            .bind(&port.mac)
            .fetch_one(&mut *conn)
            .await?;
            port.id = row.get("id");
        }

        tracing::debug!(
            "assigned {} network ports to vm id {}",
            assigned_ports.len(),
            vm_id
        );

        Ok(assigned_ports)
    }
}

impl Candidate {
    fn parse(network: &Network) -> VirtnodeResult<Self> {
        let start_ip: IpAddr = network.start_ip.parse().map_err(|_| {
            VirtnodeError::bad_input(format!(
                "stored network has invalid start_ip: name={}, start_ip={}",
                network.name, network.start_ip
            ))
        })?;
        let end_ip: IpAddr = network.end_ip.parse().map_err(|_| {
            VirtnodeError::bad_input(format!(
                "stored network has invalid end_ip: name={}, end_ip={}",
                network.name, network.end_ip
            ))
        })?;

        Ok(Self {
            id: network.id,
            name: network.name.clone(),
            start_ip,
            end_ip,
        })
    }

    fn available(&self, used_ips: &HashMap<i64, HashSet<String>>) -> u64 {
        let used = used_ips.get(&self.id).map(|s| s.len()).unwrap_or(0) as u64;
        available_ip_count(&self.start_ip, &self.end_ip).saturating_sub(used)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Picks the candidate with the most addresses left; the first candidate in
/// stable order wins ties.
fn choose_candidate<'a>(
    ids: &[i64],
    candidates: &'a HashMap<i64, Candidate>,
    used_ips: &HashMap<i64, HashSet<String>>,
) -> &'a Candidate {
    let mut best = &candidates[&ids[0]];
    let mut best_available = best.available(used_ips);

    for id in &ids[1..] {
        let candidate = &candidates[id];
        let available = candidate.available(used_ips);
        if available > best_available {
            best = candidate;
            best_available = available;
        }
    }

    best
}
