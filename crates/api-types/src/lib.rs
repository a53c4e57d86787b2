//! Shared API type definitions
//!
//! This crate contains the serializable form of a resource check report, as
//! emitted by `kube-resource-checker --output json`. Quantities are kept in
//! their Kubernetes string form (`"8"`, `"500m"`, `"16Gi"` normalised to base
//! units) so consumers do not lose precision.

use serde::Deserialize;
use serde::Serialize;

/// Result of checking one resource keyword on the nodes selected by a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReport {
    /// Label selector used to select nodes
    pub label_selector: String,
    /// Keyword matched against allocatable resource names
    pub resource_keyword: String,
    /// Per node breakdown, in node name order
    pub nodes: Vec<NodeUsage>,
    /// Totals across all nodes, one entry per matched resource name
    pub summary: Vec<ResourceTotals>,
    /// Nodes with capacity left when only running pods are counted
    pub available_excluding_complete: Vec<AvailableNode>,
    /// Nodes with capacity left when all bound pods are counted
    pub available_including_complete: Vec<AvailableNode>,
    /// Number of node/resource pairs that matched the keyword
    pub matched_resource_count: usize,
}

/// Usage of the matched resources on a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUsage {
    pub node_name: String,
    /// InternalIP address of the node, when reported
    pub internal_ip: Option<String>,
    /// Empty when no allocatable resource matched the keyword
    pub resources: Vec<ResourceUsage>,
}

/// Allocation figures of one resource on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub resource_name: String,
    pub total: String,
    pub used_active: String,
    pub used_all: String,
    pub available_active: String,
    pub available_all: String,
    /// Running pods requesting this resource
    pub pods: Vec<PodRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRequest {
    pub namespace: String,
    pub pod_name: String,
    pub request: String,
}

/// Totals of one resource across all selected nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTotals {
    pub resource_name: String,
    pub total: String,
    pub available_active: String,
    pub available_all: String,
    /// Fraction in `[0, 1]` for sane inputs, 0 when total is 0
    pub utilization_active: f64,
    pub utilization_all: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableNode {
    pub internal_ip: Option<String>,
    pub node_name: String,
    pub resource_name: String,
    pub available: String,
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn report_uses_camel_case_keys() {
        let report = ResourceReport {
            label_selector: "job=training".to_string(),
            resource_keyword: "gpu".to_string(),
            nodes: vec![],
            summary: vec![],
            available_excluding_complete: vec![],
            available_including_complete: vec![],
            matched_resource_count: 0,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["labelSelector"], "job=training");
        assert_eq!(value["resourceKeyword"], "gpu");
        assert_eq!(value["matchedResourceCount"], 0);
        assert!(value.get("availableExcludingComplete").is_some());
    }
}
