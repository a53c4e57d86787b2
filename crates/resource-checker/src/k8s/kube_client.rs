use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::debug;

use crate::k8s::types::KubernetesError;

/// Build a client from an explicit kubeconfig file, a named context of the
/// default kubeconfig, or the default chain (in-cluster, then `~/.kube/config`).
pub async fn init_kube_client(
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
) -> Result<Client, Report<KubernetesError>> {
    let options = KubeConfigOptions {
        context,
        ..Default::default()
    };

    let config = match kubeconfig {
        Some(kubeconfig_path) => {
            debug!(path = %kubeconfig_path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).change_context(
                KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?
        }
        None if options.context.is_some() => Config::from_kubeconfig(&options)
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: format!(
                    "Failed to load context {:?} from the default kubeconfig",
                    options.context
                ),
            })?,
        None => Config::infer()
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: "Failed to infer Kubernetes configuration".to_string(),
            })?,
    };

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client".to_string(),
    })
}
