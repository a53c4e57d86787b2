use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use tracing::debug;

use crate::k8s::kube_client;
use crate::k8s::source::ClusterSource;
use crate::k8s::types::KubernetesError;
use crate::k8s::types::NodeSnapshot;
use crate::k8s::types::PodSnapshot;
use crate::selector::LabelSelector;

/// Reads nodes and pods straight from the API server.
pub struct KubeApiSource {
    client: Client,
}

impl KubeApiSource {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the given kubeconfig and context, see
    /// [`kube_client::init_kube_client`].
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ConnectionFailed`] if no usable configuration is found
    pub async fn connect(
        kubeconfig: Option<PathBuf>,
        context: Option<String>,
    ) -> Result<Self, Report<KubernetesError>> {
        let client = kube_client::init_kube_client(kubeconfig, context).await?;
        Ok(Self::new(client))
    }
}

#[async_trait::async_trait]
impl ClusterSource for KubeApiSource {
    #[tracing::instrument(skip(self, selector), fields(selector = %selector))]
    async fn list_nodes(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<NodeSnapshot>, Report<KubernetesError>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&selector.to_string());

        let nodes = api
            .list(&params)
            .await
            .change_context(KubernetesError::ListFailed { resource: "nodes" })
            .attach_printable_lazy(|| format!("label selector: {selector}"))?;

        debug!(count = nodes.items.len(), "listed nodes");
        Ok(nodes.items.into_iter().map(NodeSnapshot::from).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, Report<KubernetesError>> {
        let api: Api<Pod> = Api::all(self.client.clone());

        let pods = api
            .list(&ListParams::default())
            .await
            .change_context(KubernetesError::ListFailed { resource: "pods" })?;

        debug!(count = pods.items.len(), "listed pods");
        Ok(pods.items.into_iter().map(PodSnapshot::from).collect())
    }
}
