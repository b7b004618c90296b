use sqlx::Row;

use crate::{config::VmSpec, VirtnodeError, VirtnodeResult};

use super::{
    models::{Vm, VmNetworkPort, VmResource, VmStatus},
    VirtController,
};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtController {
    /// Creates a VM record, resolving its image and allocating its network
    /// ports inside one transaction.
    ///
    /// If an active VM with the same name already exists, only the stored
    /// spec payload is updated, and only when it actually changed; live
    /// instances are reconciled by the separate start flow, not here. Any
    /// error during creation rolls the whole transaction back, so no VM row
    /// and no port rows become visible.
    pub async fn create_or_update_vm(&self, spec: &VmSpec) -> VirtnodeResult<()> {
        spec.validate()?;
        let payload = spec.kind.payload_json()?;

        match self.get_vm(&spec.name).await {
            Err(err) if err.is_not_found() => {
                let mut tx = self.pool().begin().await?;

                let image = self.detect_image(&mut tx, &spec.image).await?;

                let row = sqlx::query(
                    r#"
                    INSERT INTO vms (name, kind, vcpus, memory_mb, disk_gb, image_id, status, spec)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING id
                    "#,
                )
                .bind(&spec.name)
                .bind(spec.kind.kind_name())
                .bind(spec.vcpus as i64)
                .bind(spec.memory_mb as i64)
                .bind(spec.disk_gb as i64)
                .bind(image.id)
                .bind(VmStatus::Created.as_str())
                .bind(&payload)
                .fetch_one(&mut *tx)
                .await?;
                let vm_id: i64 = row.get("id");

                let ports = self
                    .assign_network_ports(&mut tx, vm_id, &spec.networks)
                    .await?;

                tx.commit().await?;

                tracing::info!(
                    "created vm {} with image {} and {} ports",
                    spec.name,
                    image.name,
                    ports.len()
                );
                Ok(())
            }
            Ok(vm) => {
                if vm.spec_str != payload {
                    sqlx::query("UPDATE vms SET spec = ? WHERE id = ?")
                        .bind(&payload)
                        .bind(vm.id)
                        .execute(self.pool())
                        .await?;
                    tracing::info!("updated vm spec for {}", spec.name);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Looks up the active VM with the given name.
    pub async fn get_vm(&self, name: &str) -> VirtnodeResult<Vm> {
        let rows = sqlx::query("SELECT * FROM vms WHERE deleted_at IS NULL AND name = ?")
            .bind(name)
            .fetch_all(self.pool())
            .await?;

        match rows.len() {
            0 => Err(VirtnodeError::not_found(format!(
                "vm is not found: name={}",
                name
            ))),
            1 => Vm::from_row(&rows[0]),
            n => Err(VirtnodeError::conflict(format!(
                "duplicated vms are found: name={}, len={}",
                name, n
            ))),
        }
    }

    /// Lists active VMs with their image and assigned ports, optionally
    /// filtered by name.
    pub async fn list_vms(&self, names: &[String]) -> VirtnodeResult<Vec<VmResource>> {
        let base_sql = r#"
            SELECT v.*, i.name AS image_name, i.kind AS image_kind
            FROM vms AS v
            INNER JOIN images AS i ON v.image_id = i.id
            WHERE v.deleted_at IS NULL
        "#;

        let vm_rows = if names.is_empty() {
            sqlx::query(&format!("{} ORDER BY v.id", base_sql))
                .fetch_all(self.pool())
                .await?
        } else {
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!("{} AND v.name IN ({}) ORDER BY v.id", base_sql, placeholders);
            let mut query = sqlx::query(&sql);
            for name in names {
                query = query.bind(name);
            }
            query.fetch_all(self.pool()).await?
        };

        let mut resources = Vec::with_capacity(vm_rows.len());
        for row in &vm_rows {
            resources.push(VmResource {
                vm: Vm::from_row(row)?,
                image_name: row.get("image_name"),
                image_kind: row.get("image_kind"),
                ports: Vec::new(),
            });
        }

        if resources.is_empty() {
            return Ok(resources);
        }

        let port_rows = sqlx::query(
            r#"
            SELECT p.*, n.name AS network_name, n.kind AS network_kind, n.subnet, n.gateway
            FROM network_ports AS p
            INNER JOIN networks AS n ON n.id = p.network_id
            WHERE p.deleted_at IS NULL
            ORDER BY p.id
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        for row in &port_rows {
            let port = VmNetworkPort::from_row(row);
            if let Some(resource) = resources.iter_mut().find(|r| r.vm.id == port.port.vm_id) {
                resource.ports.push(port);
            }
        }

        Ok(resources)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
