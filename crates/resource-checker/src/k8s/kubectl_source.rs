use std::ffi::OsString;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::k8s::source::ClusterSource;
use crate::k8s::types::KubernetesError;
use crate::k8s::types::NodeSnapshot;
use crate::k8s::types::PodSnapshot;
use crate::selector::LabelSelector;

/// Body of `kubectl get <kind> -o json`.
#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Reads nodes and pods by running `kubectl`, for hosts where only the
/// command line client is configured.
#[derive(Debug, Clone)]
pub struct KubectlSource {
    program: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl KubectlSource {
    pub fn new(program: PathBuf, kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            program,
            kubeconfig,
            context,
        }
    }

    fn command_args(&self, args: &[&str]) -> Vec<OsString> {
        let mut full = Vec::with_capacity(args.len() + 4);
        if let Some(kubeconfig) = &self.kubeconfig {
            full.push(OsString::from("--kubeconfig"));
            full.push(kubeconfig.clone().into_os_string());
        }
        if let Some(context) = &self.context {
            full.push(OsString::from("--context"));
            full.push(OsString::from(context));
        }
        full.extend(args.iter().map(OsString::from));
        full
    }

    /// Run kubectl and return its stdout.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::CommandFailed`] if kubectl cannot be spawned or
    ///   exits unsuccessfully
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, Report<KubernetesError>> {
        let args = self.command_args(args);
        let command_line = std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %command_line, "running kubectl");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .change_context_lazy(|| KubernetesError::CommandFailed {
                command: command_line.clone(),
                message: "failed to spawn".to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Report::new(KubernetesError::CommandFailed {
                command: command_line,
                message: format!("{}: {}", output.status, stderr.trim()),
            }));
        }

        Ok(output.stdout)
    }
}

/// Decode the `items` of a kubectl JSON list.
///
/// # Errors
///
/// - [`KubernetesError::DecodeFailed`] if the body is not a list of `T`
pub(crate) fn decode_items<T: DeserializeOwned>(
    resource: &'static str,
    body: &[u8],
) -> Result<Vec<T>, Report<KubernetesError>> {
    let list: ItemList<T> = serde_json::from_slice(body)
        .change_context(KubernetesError::DecodeFailed { resource })?;
    Ok(list.items)
}

#[async_trait::async_trait]
impl ClusterSource for KubectlSource {
    async fn list_nodes(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<NodeSnapshot>, Report<KubernetesError>> {
        let selector = selector.to_string();
        let body = self
            .run(&["get", "nodes", "-l", &selector, "-o", "json"])
            .await?;
        let nodes: Vec<Node> = decode_items("nodes", &body)?;
        Ok(nodes.into_iter().map(NodeSnapshot::from).collect())
    }

    async fn list_pods(&self) -> Result<Vec<PodSnapshot>, Report<KubernetesError>> {
        let body = self
            .run(&["get", "pods", "--all-namespaces", "-o", "json"])
            .await?;
        let pods: Vec<Pod> = decode_items("pods", &body)?;
        Ok(pods.into_iter().map(PodSnapshot::from).collect())
    }
}
