//! Aggregation of node capacity and pod requests into a resource report.

use core::error::Error;
use std::collections::BTreeMap;
use std::collections::HashMap;

use error_stack::Report;
use error_stack::ResultExt;
use tracing::debug;
use tracing::info;

use crate::k8s::ClusterSource;
use crate::k8s::NodeSnapshot;
use crate::k8s::PodSnapshot;
use crate::quantity::Quantity;
use crate::query::Query;

/// Errors that can occur while computing a report.
#[derive(Debug, derive_more::Display)]
pub enum CheckError {
    #[display("Failed to read cluster state")]
    Cluster,
    #[display("Invalid quantity `{value}` for {resource} on {owner}")]
    InvalidQuantity {
        owner: String,
        resource: String,
        value: String,
    },
}

impl Error for CheckError {}

/// A pod counted in the active usage of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub request: Quantity,
}

/// Allocation of one resource on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUsage {
    pub resource_name: String,
    pub total: Quantity,
    /// Requests of running pods
    pub used_active: Quantity,
    /// Requests of every pod bound to the node, completed ones included
    pub used_all: Quantity,
    pub pods: Vec<PodUsage>,
}

impl ResourceUsage {
    pub fn available_active(&self) -> Quantity {
        self.total - self.used_active
    }

    pub fn available_all(&self) -> Quantity {
        self.total - self.used_all
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub name: String,
    pub internal_ip: Option<String>,
    /// Empty when nothing allocatable on the node matched the keyword
    pub resources: Vec<ResourceUsage>,
}

/// Totals of one resource across all selected nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub resource_name: String,
    pub total: Quantity,
    pub available_active: Quantity,
    pub available_all: Quantity,
}

impl ResourceSummary {
    pub fn utilization_active(&self) -> f64 {
        utilization(self.total, self.available_active)
    }

    pub fn utilization_all(&self) -> f64 {
        utilization(self.total, self.available_all)
    }
}

fn utilization(total: Quantity, available: Quantity) -> f64 {
    if total == Quantity::zero() {
        0.0
    } else {
        1.0 - available.as_f64() / total.as_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableNode {
    pub internal_ip: Option<String>,
    pub node_name: String,
    pub resource_name: String,
    pub available: Quantity,
}

/// Outcome of a resource check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub label_selector: String,
    pub resource_keyword: String,
    /// Sorted by node name
    pub nodes: Vec<NodeReport>,
    /// Sorted by resource name
    pub summary: Vec<ResourceSummary>,
    /// Sorted by node address, then node and resource name
    pub available_active: Vec<AvailableNode>,
    pub available_all: Vec<AvailableNode>,
}

impl CheckReport {
    /// Number of node/resource pairs that matched the keyword.
    pub fn matched_resource_count(&self) -> usize {
        self.nodes.iter().map(|node| node.resources.len()).sum()
    }

    pub fn to_api(&self) -> api_types::ResourceReport {
        let available = |nodes: &[AvailableNode]| {
            nodes
                .iter()
                .map(|node| api_types::AvailableNode {
                    internal_ip: node.internal_ip.clone(),
                    node_name: node.node_name.clone(),
                    resource_name: node.resource_name.clone(),
                    available: node.available.to_string(),
                })
                .collect()
        };

        api_types::ResourceReport {
            label_selector: self.label_selector.clone(),
            resource_keyword: self.resource_keyword.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|node| api_types::NodeUsage {
                    node_name: node.name.clone(),
                    internal_ip: node.internal_ip.clone(),
                    resources: node
                        .resources
                        .iter()
                        .map(|usage| api_types::ResourceUsage {
                            resource_name: usage.resource_name.clone(),
                            total: usage.total.to_string(),
                            used_active: usage.used_active.to_string(),
                            used_all: usage.used_all.to_string(),
                            available_active: usage.available_active().to_string(),
                            available_all: usage.available_all().to_string(),
                            pods: usage
                                .pods
                                .iter()
                                .map(|pod| api_types::PodRequest {
                                    namespace: pod.namespace.clone(),
                                    pod_name: pod.name.clone(),
                                    request: pod.request.to_string(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
            summary: self
                .summary
                .iter()
                .map(|totals| api_types::ResourceTotals {
                    resource_name: totals.resource_name.clone(),
                    total: totals.total.to_string(),
                    available_active: totals.available_active.to_string(),
                    available_all: totals.available_all.to_string(),
                    utilization_active: totals.utilization_active(),
                    utilization_all: totals.utilization_all(),
                })
                .collect(),
            available_excluding_complete: available(&self.available_active),
            available_including_complete: available(&self.available_all),
            matched_resource_count: self.matched_resource_count(),
        }
    }
}

/// Computes [`CheckReport`]s from a [`ClusterSource`].
pub struct ResourceChecker<S> {
    source: S,
}

impl<S: ClusterSource> ResourceChecker<S> {
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Read nodes and pods once and aggregate them for `query`.
    ///
    /// # Errors
    ///
    /// - [`CheckError::Cluster`] if either listing fails
    /// - [`CheckError::InvalidQuantity`] if an allocatable amount or a pod
    ///   request cannot be parsed
    #[tracing::instrument(skip(self, query), fields(resource = %query.resource, selector = %query.selector))]
    pub async fn check(&self, query: &Query) -> Result<CheckReport, Report<CheckError>> {
        let (mut nodes, pods) = tokio::try_join!(
            self.source.list_nodes(&query.selector),
            self.source.list_pods()
        )
        .change_context(CheckError::Cluster)?;
        info!(nodes = nodes.len(), pods = pods.len(), "cluster snapshot read");

        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        let pods_by_node = group_pods_by_node(&pods);

        let node_reports = nodes
            .iter()
            .map(|node| {
                let pods = pods_by_node
                    .get(node.name.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                node_report(node, pods, query)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summarize(query, node_reports))
    }
}

fn group_pods_by_node(pods: &[PodSnapshot]) -> HashMap<&str, Vec<&PodSnapshot>> {
    let mut grouped: HashMap<&str, Vec<&PodSnapshot>> = HashMap::new();
    for pod in pods {
        if let Some(node_name) = pod.node_name.as_deref() {
            grouped.entry(node_name).or_default().push(pod);
        }
    }
    grouped
}

fn node_report(
    node: &NodeSnapshot,
    pods: &[&PodSnapshot],
    query: &Query,
) -> Result<NodeReport, Report<CheckError>> {
    let resources = node
        .allocatable
        .iter()
        .filter(|(name, _)| query.resource.is_match(name))
        .map(|(name, raw)| {
            let total = Quantity::parse(raw).change_context_lazy(|| CheckError::InvalidQuantity {
                owner: format!("node {}", node.name),
                resource: name.clone(),
                value: raw.clone(),
            })?;
            resource_usage(name, total, pods)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if resources.is_empty() {
        debug!(node = %node.name, keyword = %query.resource, "no matching resources");
    }

    Ok(NodeReport {
        name: node.name.clone(),
        internal_ip: node.internal_ip.clone(),
        resources,
    })
}

fn resource_usage(
    resource_name: &str,
    total: Quantity,
    pods: &[&PodSnapshot],
) -> Result<ResourceUsage, Report<CheckError>> {
    let mut usage = ResourceUsage {
        resource_name: resource_name.to_string(),
        total,
        used_active: Quantity::zero(),
        used_all: Quantity::zero(),
        pods: Vec::new(),
    };

    for pod in pods {
        let mut requested = None;
        for container in &pod.containers {
            let Some(raw) = container.requests.get(resource_name) else {
                continue;
            };
            let request =
                Quantity::parse(raw).change_context_lazy(|| CheckError::InvalidQuantity {
                    owner: format!("pod {}/{}", pod.namespace, pod.name),
                    resource: resource_name.to_string(),
                    value: raw.clone(),
                })?;
            *requested.get_or_insert_with(Quantity::zero) += request;
        }

        let Some(request) = requested else {
            continue;
        };
        usage.used_all += request;
        if pod.is_running() {
            usage.used_active += request;
            usage.pods.push(PodUsage {
                namespace: pod.namespace.clone(),
                name: pod.name.clone(),
                request,
            });
        }
    }

    Ok(usage)
}

fn summarize(query: &Query, nodes: Vec<NodeReport>) -> CheckReport {
    let mut summary: BTreeMap<&str, ResourceSummary> = BTreeMap::new();
    let mut available_active = Vec::new();
    let mut available_all = Vec::new();

    for node in &nodes {
        for usage in &node.resources {
            let totals = summary
                .entry(usage.resource_name.as_str())
                .or_insert_with(|| ResourceSummary {
                    resource_name: usage.resource_name.clone(),
                    total: Quantity::zero(),
                    available_active: Quantity::zero(),
                    available_all: Quantity::zero(),
                });
            totals.total += usage.total;
            totals.available_active += usage.available_active();
            totals.available_all += usage.available_all();

            let available_node = |available: Quantity| AvailableNode {
                internal_ip: node.internal_ip.clone(),
                node_name: node.name.clone(),
                resource_name: usage.resource_name.clone(),
                available,
            };
            if usage.available_active().is_positive() {
                available_active.push(available_node(usage.available_active()));
            }
            if usage.available_all().is_positive() {
                available_all.push(available_node(usage.available_all()));
            }
        }
    }

    for available in [&mut available_active, &mut available_all] {
        available.sort_by(|a, b| {
            (&a.internal_ip, &a.node_name, &a.resource_name).cmp(&(
                &b.internal_ip,
                &b.node_name,
                &b.resource_name,
            ))
        });
    }

    let summary = summary.into_values().collect();
    CheckReport {
        label_selector: query.selector.to_string(),
        resource_keyword: query.resource.keyword().to_string(),
        nodes,
        summary,
        available_active,
        available_all,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::k8s::memory::MemoryCluster;
    use crate::k8s::ContainerRequests;
    use crate::query::ResourcePattern;
    use crate::selector::LabelSelector;

    pub(crate) fn node(
        name: &str,
        ip: &str,
        labels: &[(&str, &str)],
        allocatable: &[(&str, &str)],
    ) -> NodeSnapshot {
        NodeSnapshot {
            name: name.to_string(),
            internal_ip: Some(ip.to_string()),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            allocatable: allocatable
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub(crate) fn pod(
        namespace: &str,
        name: &str,
        node_name: &str,
        phase: &str,
        requests: &[(&str, &str)],
    ) -> PodSnapshot {
        PodSnapshot {
            namespace: namespace.to_string(),
            name: name.to_string(),
            node_name: Some(node_name.to_string()),
            phase: Some(phase.to_string()),
            containers: vec![ContainerRequests {
                name: "main".to_string(),
                requests: requests
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            }],
        }
    }

    pub(crate) fn query(resource: &str, label: &str) -> Query {
        Query {
            resource: ResourcePattern::new(resource).unwrap(),
            selector: LabelSelector::parse(label).unwrap(),
        }
    }

    /// Two training nodes with GPUs, one InfiniBand node with SR-IOV devices.
    pub(crate) fn training_cluster() -> MemoryCluster {
        MemoryCluster::new(
            vec![
                node(
                    "gpu-node-2",
                    "10.0.0.12",
                    &[("job", "training")],
                    &[("cpu", "64"), ("nvidia.com/gpu", "8")],
                ),
                node(
                    "gpu-node-1",
                    "10.0.0.11",
                    &[("job", "training")],
                    &[("cpu", "64"), ("nvidia.com/gpu", "8")],
                ),
                node(
                    "ib-node-1",
                    "10.0.1.21",
                    &[("job", "ib")],
                    &[
                        ("cpu", "96"),
                        ("spidernet.io/sriov_netdevice", "4"),
                        ("spidernet.io/sriov_rdma", "2"),
                    ],
                ),
            ],
            vec![
                pod("ml", "trainer-0", "gpu-node-1", "Running", &[("nvidia.com/gpu", "4")]),
                pod("ml", "eval-0", "gpu-node-1", "Succeeded", &[("nvidia.com/gpu", "2")]),
                pod("ml", "trainer-1", "gpu-node-2", "Running", &[("nvidia.com/gpu", "8")]),
                pod("ml", "cpu-job", "gpu-node-2", "Running", &[("cpu", "4")]),
                pod(
                    "hpc",
                    "mpi-0",
                    "ib-node-1",
                    "Running",
                    &[("spidernet.io/sriov_netdevice", "1")],
                ),
            ],
        )
    }

    #[test(tokio::test)]
    async fn gpu_usage_on_training_nodes() {
        let checker = ResourceChecker::new(training_cluster());

        let report = checker.check(&query("gpu", "job=training")).await.unwrap();

        assert_eq!(report.matched_resource_count(), 2);
        assert_eq!(
            report
                .nodes
                .iter()
                .map(|node| node.name.as_str())
                .collect::<Vec<_>>(),
            vec!["gpu-node-1", "gpu-node-2"]
        );

        let node1 = &report.nodes[0].resources[0];
        assert_eq!(node1.resource_name, "nvidia.com/gpu");
        assert_eq!(node1.total, Quantity::from_units(8));
        assert_eq!(node1.used_active, Quantity::from_units(4));
        assert_eq!(node1.used_all, Quantity::from_units(6));
        assert_eq!(node1.available_active(), Quantity::from_units(4));
        assert_eq!(node1.available_all(), Quantity::from_units(2));
        assert_eq!(
            node1.pods,
            vec![PodUsage {
                namespace: "ml".to_string(),
                name: "trainer-0".to_string(),
                request: Quantity::from_units(4),
            }]
        );

        let node2 = &report.nodes[1].resources[0];
        assert_eq!(node2.available_active(), Quantity::zero());

        assert_eq!(
            report.summary,
            vec![ResourceSummary {
                resource_name: "nvidia.com/gpu".to_string(),
                total: Quantity::from_units(16),
                available_active: Quantity::from_units(4),
                available_all: Quantity::from_units(2),
            }]
        );
        assert_eq!(report.summary[0].utilization_active(), 0.75);
        assert_eq!(report.summary[0].utilization_all(), 0.875);

        assert_eq!(
            report.available_active,
            vec![AvailableNode {
                internal_ip: Some("10.0.0.11".to_string()),
                node_name: "gpu-node-1".to_string(),
                resource_name: "nvidia.com/gpu".to_string(),
                available: Quantity::from_units(4),
            }]
        );
        assert_eq!(report.available_all.len(), 1);
        assert_eq!(report.available_all[0].available, Quantity::from_units(2));
    }

    #[test(tokio::test)]
    async fn sriov_keyword_matches_every_device_pool() {
        let checker = ResourceChecker::new(training_cluster());

        let report = checker.check(&query("sriov", "job=ib")).await.unwrap();

        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.matched_resource_count(), 2);
        let names: Vec<_> = report.nodes[0]
            .resources
            .iter()
            .map(|usage| usage.resource_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["spidernet.io/sriov_netdevice", "spidernet.io/sriov_rdma"]
        );
        assert_eq!(
            report.nodes[0].resources[0].available_active(),
            Quantity::from_units(3)
        );
        assert_eq!(
            report.nodes[0].resources[1].available_active(),
            Quantity::from_units(2)
        );
    }

    #[test(tokio::test)]
    async fn no_matching_resource_yields_zero_count() {
        let checker = ResourceChecker::new(training_cluster());

        let report = checker.check(&query("sriov", "job=training")).await.unwrap();

        assert_eq!(report.matched_resource_count(), 0);
        assert_eq!(report.nodes.len(), 2);
        assert!(report.nodes.iter().all(|node| node.resources.is_empty()));
        assert!(report.summary.is_empty());
        assert!(report.available_active.is_empty());
        assert!(report.available_all.is_empty());
    }

    #[test(tokio::test)]
    async fn no_matching_node_yields_zero_count() {
        let checker = ResourceChecker::new(training_cluster());

        let report = checker.check(&query("gpu", "job=inference")).await.unwrap();

        assert_eq!(report.matched_resource_count(), 0);
        assert!(report.nodes.is_empty());
    }

    #[test(tokio::test)]
    async fn requests_are_summed_across_containers() {
        let mut cluster = MemoryCluster::new(
            vec![node(
                "gpu-node-1",
                "10.0.0.11",
                &[("job", "training")],
                &[("nvidia.com/gpu", "8")],
            )],
            vec![],
        );
        let mut multi = pod("ml", "multi", "gpu-node-1", "Running", &[("nvidia.com/gpu", "1")]);
        multi.containers.push(ContainerRequests {
            name: "sidecar".to_string(),
            requests: BTreeMap::from([("nvidia.com/gpu".to_string(), "2".to_string())]),
        });
        cluster.pods.push(multi);
        cluster.pods.push(PodSnapshot {
            node_name: None,
            ..pod("ml", "pending", "", "Pending", &[("nvidia.com/gpu", "8")])
        });

        let report = ResourceChecker::new(cluster)
            .check(&query("gpu", "job=training"))
            .await
            .unwrap();

        let usage = &report.nodes[0].resources[0];
        assert_eq!(usage.used_active, Quantity::from_units(3));
        assert_eq!(usage.used_all, Quantity::from_units(3));
        assert_eq!(usage.pods.len(), 1);
        assert_eq!(usage.pods[0].request, Quantity::from_units(3));
    }

    #[test(tokio::test)]
    async fn zero_total_has_zero_utilization() {
        let cluster = MemoryCluster::new(
            vec![node(
                "gpu-node-1",
                "10.0.0.11",
                &[("job", "training")],
                &[("nvidia.com/gpu", "0")],
            )],
            vec![],
        );

        let report = ResourceChecker::new(cluster)
            .check(&query("gpu", "job=training"))
            .await
            .unwrap();

        assert_eq!(report.summary[0].utilization_active(), 0.0);
        assert_eq!(report.summary[0].utilization_all(), 0.0);
        assert!(report.available_active.is_empty());
    }

    #[test(tokio::test)]
    async fn invalid_allocatable_names_the_node() {
        let cluster = MemoryCluster::new(
            vec![node(
                "gpu-node-1",
                "10.0.0.11",
                &[("job", "training")],
                &[("nvidia.com/gpu", "eight")],
            )],
            vec![],
        );

        let err = ResourceChecker::new(cluster)
            .check(&query("gpu", "job=training"))
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context().to_string(),
            "Invalid quantity `eight` for nvidia.com/gpu on node gpu-node-1"
        );
    }

    #[test(tokio::test)]
    async fn available_nodes_are_ordered_by_address() {
        let cluster = MemoryCluster::new(
            vec![
                node("a-node", "10.0.0.9", &[("job", "training")], &[("nvidia.com/gpu", "8")]),
                node("b-node", "10.0.0.10", &[("job", "training")], &[("nvidia.com/gpu", "8")]),
            ],
            vec![],
        );

        let report = ResourceChecker::new(cluster)
            .check(&query("gpu", "job=training"))
            .await
            .unwrap();

        let order = |nodes: &[AvailableNode]| {
            nodes
                .iter()
                .map(|node| node.node_name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&report.available_active), vec!["b-node", "a-node"]);
        assert_eq!(order(&report.available_all), vec!["b-node", "a-node"]);
        assert_eq!(report.nodes[0].name, "a-node");
    }

    #[test(tokio::test)]
    async fn unreachable_cluster_is_reported() {
        let mut cluster = training_cluster();
        cluster.unreachable = true;

        let err = ResourceChecker::new(cluster)
            .check(&query("gpu", "job=training"))
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), CheckError::Cluster));
    }

    #[test(tokio::test)]
    async fn api_report_mirrors_domain_report() {
        let report = ResourceChecker::new(training_cluster())
            .check(&query("gpu", "job=training"))
            .await
            .unwrap();

        let api = report.to_api();

        assert_eq!(api.label_selector, "job=training");
        assert_eq!(api.resource_keyword, "gpu");
        assert_eq!(api.matched_resource_count, 2);
        assert_eq!(api.nodes[0].resources[0].available_all, "2");
        assert_eq!(api.summary[0].total, "16");
        assert_eq!(api.available_excluding_complete.len(), 1);
    }
}
