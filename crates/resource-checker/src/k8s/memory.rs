//! In-memory cluster used by tests.

use error_stack::Report;

use crate::k8s::source::ClusterSource;
use crate::k8s::types::KubernetesError;
use crate::k8s::types::NodeSnapshot;
use crate::k8s::types::PodSnapshot;
use crate::selector::LabelSelector;

/// Serves fixed nodes and pods, filtering nodes with the selector locally.
#[derive(Debug, Default, Clone)]
pub struct MemoryCluster {
    pub nodes: Vec<NodeSnapshot>,
    pub pods: Vec<PodSnapshot>,
    /// Makes every listing fail, to exercise error paths
    pub unreachable: bool,
}

impl MemoryCluster {
    pub fn new(nodes: Vec<NodeSnapshot>, pods: Vec<PodSnapshot>) -> Self {
        Self {
            nodes,
            pods,
            unreachable: false,
        }
    }

    fn check_reachable(&self) -> Result<(), Report<KubernetesError>> {
        if self.unreachable {
            return Err(Report::new(KubernetesError::ConnectionFailed {
                message: "cluster unreachable".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterSource for MemoryCluster {
    async fn list_nodes(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<NodeSnapshot>, Report<KubernetesError>> {
        self.check_reachable()?;
        Ok(self
            .nodes
            .iter()
            .filter(|node| selector.matches(&node.labels))
            .cloned()
            .collect())
    }

    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, Report<KubernetesError>> {
        self.check_reachable()?;
        Ok(self.pods.clone())
    }
}
