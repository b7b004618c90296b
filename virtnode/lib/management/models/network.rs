use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A persisted network row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    /// The row id.
    pub id: i64,

    /// The name of the network, unique among active rows within a namespace.
    pub name: String,

    /// The namespace the network belongs to.
    pub namespace: String,

    /// The kind discriminator of the spec payload.
    pub kind: String,

    /// The subnet in CIDR notation.
    pub subnet: String,

    /// The first address of the allocatable range.
    pub start_ip: String,

    /// The end of the allocatable range (exclusive).
    pub end_ip: String,

    /// The gateway address.
    pub gateway: String,

    /// The canonical JSON of the kind payload.
    #[serde(skip)]
    pub spec_str: String,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was soft deleted, if ever.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A persisted network port row.
///
/// Ports are created only inside the owning VM's creation transaction and are
/// never independently created or deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkPort {
    /// The row id.
    pub id: i64,

    /// The network the port belongs to.
    pub network_id: i64,

    /// The VM the port is assigned to.
    pub vm_id: i64,

    /// The assigned IP address, unique within the active network.
    pub ip: String,

    /// The assigned MAC address, unique within the active network.
    pub mac: String,
}

/// A network port joined with its network, as returned by VM listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmNetworkPort {
    /// The port row.
    pub port: NetworkPort,

    /// The name of the port's network.
    pub network_name: String,

    /// The kind of the port's network.
    pub network_kind: String,

    /// The subnet of the port's network.
    pub subnet: String,

    /// The gateway of the port's network.
    pub gateway: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Network {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            namespace: row.get("namespace"),
            kind: row.get("kind"),
            subnet: row.get("subnet"),
            start_ip: row.get("start_ip"),
            end_ip: row.get("end_ip"),
            gateway: row.get("gateway"),
            spec_str: row.get("spec"),
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        }
    }
}

impl NetworkPort {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            network_id: row.get("network_id"),
            vm_id: row.get("vm_id"),
            ip: row.get("ip"),
            mac: row.get("mac"),
        }
    }
}

impl VmNetworkPort {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            port: NetworkPort::from_row(row),
            network_name: row.get("network_name"),
            network_kind: row.get("network_kind"),
            subnet: row.get("subnet"),
            gateway: row.get("gateway"),
        }
    }
}
