use crate::{config::NetworkSpec, VirtnodeError, VirtnodeResult};

use super::{models::Network, VirtController};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtController {
    /// Creates a network record after validating its spec and address
    /// geometry.
    ///
    /// If an active network with the same name already exists the call is a
    /// no-op; changing a network's addressing in place is not supported, only
    /// the difference is recorded in the logs.
    pub async fn create_or_update_network(&self, spec: &NetworkSpec) -> VirtnodeResult<()> {
        spec.validate()?;
        let payload = spec.kind.payload_json()?;
        let parsed = spec.parse_geometry()?;

        match self.get_network(&spec.name).await {
            Err(err) if err.is_not_found() => {
                let mut tx = self.pool().begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO networks (name, namespace, kind, subnet, start_ip, end_ip, gateway, spec)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&spec.name)
                .bind(&spec.namespace)
                .bind(spec.kind.kind_name())
                .bind(&spec.subnet)
                .bind(&spec.start_ip)
                .bind(&spec.end_ip)
                .bind(&spec.gateway)
                .bind(&payload)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                tracing::info!(
                    "created network {} with {} allocatable addresses",
                    spec.name,
                    parsed.available_ips
                );
                Ok(())
            }
            Ok(network) => {
                if network.spec_str != payload || network.subnet != spec.subnet {
                    tracing::debug!(
                        "network {} already exists with a different spec; in-place network updates are not supported",
                        spec.name
                    );
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Looks up the active network with the given name.
    pub async fn get_network(&self, name: &str) -> VirtnodeResult<Network> {
        let rows = sqlx::query("SELECT * FROM networks WHERE deleted_at IS NULL AND name = ?")
            .bind(name)
            .fetch_all(self.pool())
            .await?;

        match rows.len() {
            0 => Err(VirtnodeError::not_found(format!(
                "network is not found: name={}",
                name
            ))),
            1 => Ok(Network::from_row(&rows[0])),
            n => Err(VirtnodeError::conflict(format!(
                "duplicated networks are found: name={}, len={}",
                name, n
            ))),
        }
    }

    /// Lists active networks, optionally filtered by name.
    pub async fn list_networks(&self, names: &[String]) -> VirtnodeResult<Vec<Network>> {
        let rows = if names.is_empty() {
            sqlx::query("SELECT * FROM networks WHERE deleted_at IS NULL ORDER BY id")
                .fetch_all(self.pool())
                .await?
        } else {
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!(
                "SELECT * FROM networks WHERE deleted_at IS NULL AND name IN ({}) ORDER BY id",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for name in names {
                query = query.bind(name);
            }
            query.fetch_all(self.pool()).await?
        };

        Ok(rows.iter().map(Network::from_row).collect())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkKind, NetworkLocalSpec, NetworkNat, Resolver};
    use crate::management::db::{init_db, VIRT_DB_MIGRATOR};
    use sqlx::Row;
    use tempfile::tempdir;

    async fn test_controller() -> (tempfile::TempDir, VirtController) {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("virt.db"), &VIRT_DB_MIGRATOR)
            .await
            .unwrap();
        (temp_dir, VirtController::with_pool(pool))
    }

    fn network_spec(name: &str, start_ip: &str, end_ip: &str) -> NetworkSpec {
        NetworkSpec {
            name: name.to_string(),
            namespace: "default".to_string(),
            subnet: "10.0.0.0/24".to_string(),
            start_ip: start_ip.to_string(),
            end_ip: end_ip.to_string(),
            gateway: "10.0.0.1".to_string(),
            kind: NetworkKind::Local(NetworkLocalSpec {
                resolvers: vec![Resolver {
                    resolver: "8.8.8.8".to_string(),
                }],
                nat: NetworkNat::default(),
            }),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_create_network_then_get() {
        let (_guard, controller) = test_controller().await;

        controller
            .create_or_update_network(&network_spec("net0", "10.0.0.10", "10.0.0.20"))
            .await
            .unwrap();

        let network = controller.get_network("net0").await.unwrap();
        assert_eq!(network.name, "net0");
        assert_eq!(network.kind, "local");
        assert_eq!(network.start_ip, "10.0.0.10");
        assert_eq!(network.end_ip, "10.0.0.20");
    }

    #[test_log::test(tokio::test)]
    async fn test_create_network_twice_stores_one_row() {
        let (_guard, controller) = test_controller().await;
        let spec = network_spec("net0", "10.0.0.10", "10.0.0.20");

        controller.create_or_update_network(&spec).await.unwrap();
        controller.create_or_update_network(&spec).await.unwrap();

        let count = sqlx::query("SELECT COUNT(*) AS n FROM networks")
            .fetch_one(controller.pool())
            .await
            .unwrap()
            .get::<i64, _>("n");
        assert_eq!(count, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_reversed_range_writes_nothing() {
        let (_guard, controller) = test_controller().await;

        let err = controller
            .create_or_update_network(&network_spec("net0", "10.0.0.20", "10.0.0.10"))
            .await
            .unwrap_err();
        assert!(err.is_bad_input());

        let count = sqlx::query("SELECT COUNT(*) AS n FROM networks")
            .fetch_one(controller.pool())
            .await
            .unwrap()
            .get::<i64, _>("n");
        assert_eq!(count, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_get_missing_network_is_not_found() {
        let (_guard, controller) = test_controller().await;

        let err = controller.get_network("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test_log::test(tokio::test)]
    async fn test_ambiguous_network_name_is_conflict() {
        let (_guard, controller) = test_controller().await;

        for namespace in ["default", "other"] {
            sqlx::query(
                r#"
                INSERT INTO networks (name, namespace, kind, subnet, start_ip, end_ip, gateway, spec)
                VALUES (?, ?, 'local', '10.0.0.0/24', '10.0.0.10', '10.0.0.20', '10.0.0.1', '{}')
                "#,
            )
            .bind("net0")
            .bind(namespace)
            .execute(controller.pool())
            .await
            .unwrap();
        }

        let err = controller.get_network("net0").await.unwrap_err();
        assert!(err.is_conflict());
    }
}
