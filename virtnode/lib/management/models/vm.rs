use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

use crate::{VirtnodeError, VirtnodeResult};

use super::VmNetworkPort;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A persisted virtual machine row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vm {
    /// The row id.
    pub id: i64,

    /// The name of the VM, unique among active rows.
    pub name: String,

    /// The kind discriminator of the spec payload.
    pub kind: String,

    /// The number of virtual CPUs.
    pub vcpus: u32,

    /// The amount of memory in MiB.
    pub memory_mb: u32,

    /// The disk size in GiB.
    pub disk_gb: u32,

    /// The image the VM boots from.
    pub image_id: i64,

    /// The lifecycle status of the VM.
    pub status: VmStatus,

    /// The canonical JSON of the kind payload, compared on later
    /// create-or-update calls to decide whether the spec changed.
    #[serde(skip)]
    pub spec_str: String,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was soft deleted, if ever.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// The lifecycle status of a VM.
///
/// `Created` is the only reachable status today; the column is plain text so
/// a `Starting -> Running -> Stopped` lifecycle can be added without a schema
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    /// The VM record exists but no instance has been started.
    Created,
}

/// A VM joined with its image and assigned ports, as returned by listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmResource {
    /// The VM row.
    pub vm: Vm,

    /// The name of the VM's image.
    pub image_name: String,

    /// The kind of the VM's image.
    pub image_kind: String,

    /// The network ports assigned to the VM.
    pub ports: Vec<VmNetworkPort>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VmStatus {
    /// Returns the string stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
        }
    }

    /// Parses the stored `status` column value.
    pub fn parse(value: &str) -> VirtnodeResult<Self> {
        match value {
            "created" => Ok(Self::Created),
            other => Err(VirtnodeError::bad_input(format!(
                "invalid vm status: status={}",
                other
            ))),
        }
    }
}

impl Vm {
    pub(crate) fn from_row(row: &SqliteRow) -> VirtnodeResult<Self> {
        Ok(Self {
            id: row.get("id"),
            name: row.get("name"),
            kind: row.get("kind"),
            vcpus: row.get::<i64, _>("vcpus") as u32,
            memory_mb: row.get::<i64, _>("memory_mb") as u32,
            disk_gb: row.get::<i64, _>("disk_gb") as u32,
            image_id: row.get("image_id"),
            status: VmStatus::parse(row.get("status"))?,
            spec_str: row.get("spec"),
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        })
    }
}
