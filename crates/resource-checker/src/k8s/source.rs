use error_stack::Report;

use crate::k8s::types::KubernetesError;
use crate::k8s::types::NodeSnapshot;
use crate::k8s::types::PodSnapshot;
use crate::selector::LabelSelector;

/// Read access to the cluster state a resource check is computed from.
#[async_trait::async_trait]
pub trait ClusterSource: Send + Sync {
    /// List the nodes whose labels satisfy `selector`.
    async fn list_nodes(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<NodeSnapshot>, Report<KubernetesError>>;

    /// List the pods of all namespaces.
    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, Report<KubernetesError>>;
}
