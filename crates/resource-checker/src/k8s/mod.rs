//! Kubernetes integration module.
//!
//! This module reads the two snapshots a resource check needs: the nodes
//! selected by a label selector and every pod in the cluster.
//!
//! The main components are:
//! - [`ClusterSource`]: the seam between the checker and a cluster
//! - [`KubeApiSource`]: talks to the API server through a kube client
//! - [`KubectlSource`]: shells out to `kubectl ... -o json`
//! - [`NodeSnapshot`] / [`PodSnapshot`]: the fields the checker consumes

pub mod api_source;
pub mod kube_client;
pub mod kubectl_source;
#[cfg(test)]
pub(crate) mod memory;
pub mod source;
pub mod types;

pub use api_source::KubeApiSource;
pub use kubectl_source::KubectlSource;
pub use source::ClusterSource;
pub use types::ContainerRequests;
pub use types::KubernetesError;
pub use types::NodeSnapshot;
pub use types::PodSnapshot;
