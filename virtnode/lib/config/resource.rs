//! Resource documents and kind dispatch.

use serde::{Deserialize, Serialize};

use crate::{VirtnodeError, VirtnodeResult};

use super::{ImageSpec, NetworkSpec, VmSpec};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single resource document, dispatched by its `kind` tag.
///
/// Documents carry the kind at the top level and the kind-specific spec under
/// `spec`, for example:
///
/// ```yaml
/// kind: network
/// spec:
///   name: net0
///   namespace: default
///   kind: local
///   subnet: 10.0.0.0/24
///   start_ip: 10.0.0.10
///   end_ip: 10.0.0.20
///   gateway: 10.0.0.1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "lowercase")]
pub enum Resource {
    /// A virtual machine resource.
    Vm(VmSpec),

    /// An image resource.
    Image(ImageSpec),

    /// A network resource.
    Network(NetworkSpec),
}

/// The resource kinds a get request can filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// All resource kinds.
    All,

    /// Virtual machines only.
    Vm,

    /// Images only.
    Image,

    /// Networks only.
    Network,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parses a string of one or more YAML resource documents separated by the
/// standard `---` delimiter.
pub fn parse_resource_documents(input: &str) -> VirtnodeResult<Vec<Resource>> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let resource = Resource::deserialize(document)
            .map_err(|e| VirtnodeError::bad_input(format!("invalid resource document: {}", e)))?;
        resources.push(resource);
    }
    Ok(resources)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageKind, NetworkKind, VmKind};

    #[test]
    fn test_parse_multiple_documents() {
        let input = r#"
kind: network
spec:
  name: net0
  namespace: default
  kind: local
  subnet: 10.0.0.0/24
  start_ip: 10.0.0.10
  end_ip: 10.0.0.20
  gateway: 10.0.0.1
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

        let resources = parse_resource_documents(input).unwrap();
        assert_eq!(resources.len(), 3);

        match &resources[0] {
            Resource::Network(spec) => {
                assert_eq!(spec.name, "net0");
                assert!(matches!(spec.kind, NetworkKind::Local(_)));
            }
            other => panic!("expected network, got {:?}", other),
        }

        match &resources[1] {
            Resource::Image(spec) => {
                assert_eq!(spec.name, "stable");
                assert!(matches!(spec.kind, ImageKind::Url(_)));
            }
            other => panic!("expected image, got {:?}", other),
        }

        match &resources[2] {
            Resource::Vm(spec) => {
                assert_eq!(spec.name, "vm0");
                assert_eq!(spec.vcpus, 2);
                assert_eq!(spec.image.name.as_deref(), Some("stable"));
                assert_eq!(spec.networks.len(), 1);
                assert!(matches!(spec.kind, VmKind::Qemu(_)));
            }
            other => panic!("expected vm, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unsupported_kind() {
        let input = r#"
kind: volume
spec:
  name: vol0
"#;
        let err = parse_resource_documents(input).unwrap_err();
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_parse_rejects_unsupported_payload_kind() {
        let input = r#"
kind: image
spec:
  name: stable
  namespace: default
  kind: docker
  url: https://example.com/stable.qcow2
"#;
        let err = parse_resource_documents(input).unwrap_err();
        assert!(err.is_bad_input());
    }
}
