//! Topology resolution module.
//!
//! This module answers two questions for a mesh:
//! - Which workloads back which services (label-selector containment)
//! - Which services and workloads are covered by access-control policies,
//!   and which upstream services each covered workload may reach

mod selector;
mod graph;
mod snapshot;
mod resolver;

pub use selector::{labels_whitelisted, select_services, select_workloads};
pub use graph::ServiceWorkloadGraph;
pub use snapshot::{TopologySnapshot, UpstreamMap};
pub use resolver::TopologyResolver;
