//! End-to-end reconciliation tests: documents in, committed state out.

use sqlx::Row;
use tempfile::tempdir;

use virtnode::config::{parse_resource_documents, ResourceKind};
use virtnode::management::VirtController;

const DOCUMENTS: &str = r#"
kind: network
spec:
  name: net0
  namespace: default
  kind: local
  subnet: 10.0.0.0/24
  start_ip: 10.0.0.10
  end_ip: 10.0.0.20
  gateway: 10.0.0.1
  resolvers:
    - resolver: 8.8.8.8
  nat:
    enable: true
    ports: 80,443
---
kind: image
spec:
  name: stable
  namespace: default
  kind: url
  url: https://example.com/stable.qcow2
  pull_policy: IfNotPresent
---
kind: vm
spec:
  name: vm0
  kind: qemu
  vcpus: 2
  memory_mb: 1024
  disk_gb: 10
  image:
    name: stable
  networks:
    - name: net0
  service:
    restart: always
"#;

#[test_log::test(tokio::test)]
async fn test_apply_documents_then_get() {
    let temp_dir = tempdir().unwrap();
    let controller = VirtController::new(temp_dir.path().join("virt.db"))
        .await
        .unwrap();

    let resources = parse_resource_documents(DOCUMENTS).unwrap();
    controller.apply(&resources).await.unwrap();

    let result = controller.get(ResourceKind::All, &[]).await.unwrap();
    assert_eq!(result.networks.len(), 1);
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.vms.len(), 1);

    let vm = &result.vms[0];
    assert_eq!(vm.vm.name, "vm0");
    assert_eq!(vm.image_name, "stable");
    assert_eq!(vm.ports.len(), 1);
    assert_eq!(vm.ports[0].port.ip, "10.0.0.10");
    assert_eq!(vm.ports[0].network_name, "net0");
    assert!(vm.ports[0].port.mac.starts_with("02:"));
}

#[test_log::test(tokio::test)]
async fn test_apply_is_idempotent() {
    let temp_dir = tempdir().unwrap();
    let controller = VirtController::new(temp_dir.path().join("virt.db"))
        .await
        .unwrap();

    let resources = parse_resource_documents(DOCUMENTS).unwrap();
    controller.apply(&resources).await.unwrap();
    controller.apply(&resources).await.unwrap();

    for table in ["networks", "images", "vms", "network_ports"] {
        let count = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(controller.pool())
            .await
            .unwrap()
            .get::<i64, _>("n");
        assert_eq!(count, 1, "{} must hold exactly one row", table);
    }
}

#[test_log::test(tokio::test)]
async fn test_get_filters_by_kind_and_name() {
    let temp_dir = tempdir().unwrap();
    let controller = VirtController::new(temp_dir.path().join("virt.db"))
        .await
        .unwrap();

    let resources = parse_resource_documents(DOCUMENTS).unwrap();
    controller.apply(&resources).await.unwrap();

    let networks_only = controller.get(ResourceKind::Network, &[]).await.unwrap();
    assert_eq!(networks_only.networks.len(), 1);
    assert!(networks_only.vms.is_empty());
    assert!(networks_only.images.is_empty());

    let by_name = controller
        .get(ResourceKind::Vm, &["vm0".to_string()])
        .await
        .unwrap();
    assert_eq!(by_name.vms.len(), 1);

    let no_match = controller
        .get(ResourceKind::Vm, &["other".to_string()])
        .await
        .unwrap();
    assert!(no_match.vms.is_empty());
}
