use std::path::Path;

use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::{
    config::{Resource, ResourceKind},
    VirtnodeResult,
};

use super::{
    db::{get_or_create_db_pool, VIRT_DB_MIGRATOR},
    models::{Image, Network, VmResource},
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The node-local controller for declarative virt resources.
///
/// The controller owns a connection pool to the resource database and is the
/// single entry point for reconciliation and lookup. It is constructed once
/// at process start and passed wherever needed; there is no process-wide
/// singleton.
#[derive(Debug, Clone)]
pub struct VirtController {
    pool: Pool<Sqlite>,
}

/// The resources matched by a get request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GetResult {
    /// The matched VMs with their images and ports.
    pub vms: Vec<VmResource>,

    /// The matched images.
    pub images: Vec<Image>,

    /// The matched networks.
    pub networks: Vec<Network>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtController {
    /// Creates a controller backed by the SQLite database at `db_path`,
    /// creating the database and running migrations if needed.
    pub async fn new(db_path: impl AsRef<Path>) -> VirtnodeResult<Self> {
        let pool = get_or_create_db_pool(db_path, &VIRT_DB_MIGRATOR).await?;
        Ok(Self { pool })
    }

    /// Creates a controller from an existing connection pool.
    pub fn with_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Returns the controller's connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Reconciles a batch of resource documents.
    ///
    /// Resources are applied by kind in dependency order: networks first,
    /// then images, then VMs, so a batch can declare a VM together with the
    /// network and image it references.
    pub async fn apply(&self, resources: &[Resource]) -> VirtnodeResult<()> {
        for resource in resources {
            if let Resource::Network(spec) = resource {
                self.create_or_update_network(spec).await?;
            }
        }

        for resource in resources {
            if let Resource::Image(spec) = resource {
                self.create_or_update_image(spec).await?;
            }
        }

        for resource in resources {
            if let Resource::Vm(spec) = resource {
                self.create_or_update_vm(spec).await?;
            }
        }

        Ok(())
    }

    /// Looks up active resources by kind, optionally filtered by name.
    ///
    /// Listing observes only committed state and takes no locks.
    pub async fn get(&self, kind: ResourceKind, names: &[String]) -> VirtnodeResult<GetResult> {
        let mut result = GetResult::default();

        match kind {
            ResourceKind::All => {
                result.vms = self.list_vms(names).await?;
                result.networks = self.list_networks(names).await?;
                result.images = self.list_images(names).await?;
            }
            ResourceKind::Vm => {
                result.vms = self.list_vms(names).await?;
            }
            ResourceKind::Network => {
                result.networks = self.list_networks(names).await?;
            }
            ResourceKind::Image => {
                result.images = self.list_images(names).await?;
            }
        }

        Ok(result)
    }
}
