//! Reports how much of a Kubernetes extended resource (GPUs, SR-IOV device
//! pools, ...) is allocatable, requested and still free on the nodes selected
//! by a label selector.

pub mod app;
pub mod config;
pub mod k8s;
pub mod quantity;
pub mod query;
pub mod render;
pub mod report;
pub mod selector;
