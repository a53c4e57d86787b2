use core::error::Error;
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;

/// Address type reported for the node's cluster-internal address.
const INTERNAL_IP: &str = "InternalIP";

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to list {resource}")]
    ListFailed { resource: &'static str },
    #[display("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },
    #[display("Failed to decode {resource} list")]
    DecodeFailed { resource: &'static str },
}

impl Error for KubernetesError {}

/// The parts of a node a resource check looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub name: String,
    pub internal_ip: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Allocatable resources, values in raw quantity form
    pub allocatable: BTreeMap<String, String>,
}

/// The parts of a pod a resource check looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    /// `spec.nodeName`, unset while the pod is unscheduled
    pub node_name: Option<String>,
    pub phase: Option<String>,
    /// Regular containers only, init and ephemeral containers are not counted
    pub containers: Vec<ContainerRequests>,
}

impl PodSnapshot {
    pub fn is_running(&self) -> bool {
        self.phase.as_deref() == Some("Running")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRequests {
    pub name: String,
    pub requests: BTreeMap<String, String>,
}

impl From<Node> for NodeSnapshot {
    fn from(node: Node) -> Self {
        let metadata = node.metadata;
        let status = node.status.unwrap_or_default();

        let internal_ip = status
            .addresses
            .unwrap_or_default()
            .into_iter()
            .find(|addr| addr.type_ == INTERNAL_IP)
            .map(|addr| addr.address);

        let allocatable = status
            .allocatable
            .unwrap_or_default()
            .into_iter()
            .map(|(name, quantity)| (name, quantity.0))
            .collect();

        Self {
            name: metadata.name.unwrap_or_else(|| "unknown".to_string()),
            internal_ip,
            labels: metadata.labels.unwrap_or_default(),
            allocatable,
        }
    }
}

impl From<Pod> for PodSnapshot {
    fn from(pod: Pod) -> Self {
        let metadata = pod.metadata;
        let spec = pod.spec.unwrap_or_default();

        let containers = spec
            .containers
            .into_iter()
            .map(|container| ContainerRequests {
                name: container.name,
                requests: container
                    .resources
                    .and_then(|resources| resources.requests)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(name, quantity)| (name, quantity.0))
                    .collect(),
            })
            .collect();

        Self {
            namespace: metadata.namespace.unwrap_or_else(|| "default".to_string()),
            name: metadata.name.unwrap_or_else(|| "unknown".to_string()),
            node_name: spec.node_name,
            phase: pod.status.and_then(|status| status.phase),
            containers,
        }
    }
}
