//! Virtual machine spec types.

use serde::{Deserialize, Serialize};

use crate::VirtnodeResult;

use super::{ImageDetectSpec, NetworkDetectSpec};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The declarative spec for a virtual machine resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSpec {
    /// The name of the VM, unique among active rows.
    pub name: String,

    /// The number of virtual CPUs.
    pub vcpus: u32,

    /// The amount of memory in MiB.
    pub memory_mb: u32,

    /// The disk size in GiB.
    pub disk_gb: u32,

    /// The image the VM boots from, resolved at creation time.
    #[serde(default)]
    pub image: ImageDetectSpec,

    /// The networks the VM requests a port on, resolved at creation time.
    #[serde(default)]
    pub networks: Vec<NetworkDetectSpec>,

    /// The kind-specific payload.
    #[serde(flatten)]
    pub kind: VmKind,
}

/// The kind-discriminated payload of a VM spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VmKind {
    /// A QEMU-backed virtual machine.
    Qemu(VmQemuSpec),
}

/// Payload for `qemu` VMs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmQemuSpec {
    /// The systemd service the VM process runs under.
    pub service: SystemdService,
}

/// Systemd service settings for a VM process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemdService {
    /// The restart policy of the service unit.
    pub restart: RestartPolicy,
}

/// The restart policy of a VM's service unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPolicy {
    /// Restart the unit whenever it exits.
    Always,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VmKind {
    /// Returns the kind discriminator stored in the `kind` column.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Qemu(_) => "qemu",
        }
    }

    /// Serializes the kind payload to its canonical JSON form.
    ///
    /// The stored string is what later create-or-update calls compare against
    /// to decide whether the spec changed, so field order must be stable.
    pub fn payload_json(&self) -> VirtnodeResult<String> {
        match self {
            Self::Qemu(spec) => Ok(serde_json::to_string(spec)?),
        }
    }
}
