//! Bipartite service/workload graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{MeshService, MeshWorkload, ObjectRef};

use super::selector::labels_whitelisted;

/// Which workloads back which services, keyed by identity.
///
/// Every service and every workload appears as a key in its adjacency map,
/// even with no edges. Adjacency lists follow `ObjectRef` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceWorkloadGraph {
    services: BTreeMap<ObjectRef, MeshService>,
    workloads: BTreeMap<ObjectRef, MeshWorkload>,
    service_to_workloads: BTreeMap<ObjectRef, Vec<ObjectRef>>,
    workload_to_services: BTreeMap<ObjectRef, Vec<ObjectRef>>,
}

impl ServiceWorkloadGraph {
    /// Builds the graph over every (service, workload) pair.
    ///
    /// An edge exists iff the service's workload selector labels are a
    /// whitelisted subset of the workload's labels.
    #[must_use]
    pub fn build<'a>(
        services: impl IntoIterator<Item = &'a MeshService>,
        workloads: impl IntoIterator<Item = &'a MeshWorkload>,
    ) -> Self {
        let services: BTreeMap<ObjectRef, MeshService> = services
            .into_iter()
            .map(|s| (s.metadata.clone(), s.clone()))
            .collect();
        let workloads: BTreeMap<ObjectRef, MeshWorkload> = workloads
            .into_iter()
            .map(|w| (w.metadata.clone(), w.clone()))
            .collect();

        let mut service_to_workloads: BTreeMap<ObjectRef, Vec<ObjectRef>> =
            services.keys().map(|k| (k.clone(), Vec::new())).collect();
        let mut workload_to_services: BTreeMap<ObjectRef, Vec<ObjectRef>> =
            workloads.keys().map(|k| (k.clone(), Vec::new())).collect();

        for (service_ref, service) in &services {
            for (workload_ref, workload) in &workloads {
                if labels_whitelisted(&service.workload_selector_labels, &workload.labels) {
                    service_to_workloads
                        .entry(service_ref.clone())
                        .or_default()
                        .push(workload_ref.clone());
                    workload_to_services
                        .entry(workload_ref.clone())
                        .or_default()
                        .push(service_ref.clone());
                }
            }
        }

        Self {
            services,
            workloads,
            service_to_workloads,
            workload_to_services,
        }
    }

    /// Service adjacency: service -> backing workloads.
    #[must_use]
    pub const fn service_to_workloads(&self) -> &BTreeMap<ObjectRef, Vec<ObjectRef>> {
        &self.service_to_workloads
    }

    /// Workload adjacency: workload -> services it backs.
    #[must_use]
    pub const fn workload_to_services(&self) -> &BTreeMap<ObjectRef, Vec<ObjectRef>> {
        &self.workload_to_services
    }

    /// Looks up a service by identity.
    #[must_use]
    pub fn service(&self, service_ref: &ObjectRef) -> Option<&MeshService> {
        self.services.get(service_ref)
    }

    /// Looks up a workload by identity.
    #[must_use]
    pub fn workload(&self, workload_ref: &ObjectRef) -> Option<&MeshWorkload> {
        self.workloads.get(workload_ref)
    }

    /// Iterates workloads in identity order.
    pub fn workloads(&self) -> impl Iterator<Item = &MeshWorkload> {
        self.workloads.values()
    }

    /// Returns the workloads backing a service.
    #[must_use]
    pub fn backing_workloads(&self, service_ref: &ObjectRef) -> Vec<&MeshWorkload> {
        self.service_to_workloads
            .get(service_ref)
            .map(|refs| refs.iter().filter_map(|r| self.workloads.get(r)).collect())
            .unwrap_or_default()
    }

    /// Returns the services a workload backs.
    #[must_use]
    pub fn backed_services(&self, workload_ref: &ObjectRef) -> Vec<&MeshService> {
        self.workload_to_services
            .get(workload_ref)
            .map(|refs| refs.iter().filter_map(|r| self.services.get(r)).collect())
            .unwrap_or_default()
    }

    /// Keeps only the given services and workloads.
    ///
    /// Service adjacency lists are pruned to surviving workloads. Workload
    /// adjacency lists keep every backed service, so a surviving workload
    /// still resolves DNS through a service that lost policy coverage.
    pub fn retain(&mut self, services: &BTreeSet<ObjectRef>, workloads: &BTreeSet<ObjectRef>) {
        self.service_to_workloads.retain(|k, _| services.contains(k));
        self.workload_to_services.retain(|k, _| workloads.contains(k));

        for backing in self.service_to_workloads.values_mut() {
            backing.retain(|w| workloads.contains(w));
        }

        self.workloads.retain(|k, _| workloads.contains(k));
    }

    /// Number of services still in the graph.
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.service_to_workloads.len()
    }

    /// Number of workloads still in the graph.
    #[must_use]
    pub fn workload_count(&self) -> usize {
        self.workload_to_services.len()
    }

    /// Iterates services in identity order.
    pub fn services(&self) -> impl Iterator<Item = &MeshService> {
        self.service_to_workloads
            .keys()
            .filter_map(|k| self.services.get(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{service, workload};

    #[test]
    fn test_edges_follow_containment() {
        let services = vec![service("reviews", &[("app", "reviews")])];
        let workloads = vec![
            workload("reviews-v1", &[("app", "reviews"), ("version", "v1")]),
            workload("reviews-v2", &[("app", "ratings")]),
        ];

        let graph = ServiceWorkloadGraph::build(&services, &workloads);
        let backing = &graph.service_to_workloads()[&services[0].metadata];

        assert_eq!(backing, &vec![workloads[0].metadata.clone()]);
        assert!(graph.workload_to_services()[&workloads[1].metadata].is_empty());
    }

    #[test]
    fn test_services_without_backends_are_present() {
        let services = vec![
            service("reviews", &[("app", "reviews")]),
            service("details", &[]),
        ];
        let workloads = vec![workload("reviews-v1", &[("app", "reviews")])];

        let graph = ServiceWorkloadGraph::build(&services, &workloads);

        assert_eq!(graph.service_to_workloads().len(), 2);
        let details = &graph.service_to_workloads()[&services[1].metadata];
        assert!(details.is_empty());
    }

    #[test]
    fn test_retain_prunes_service_backends_only() {
        let services = vec![
            service("s1", &[("tier", "web")]),
            service("s2", &[("tier", "web")]),
        ];
        let workloads = vec![
            workload("w1", &[("tier", "web")]),
            workload("w2", &[("tier", "web")]),
        ];
        let mut graph = ServiceWorkloadGraph::build(&services, &workloads);

        let keep_services = BTreeSet::from([services[0].metadata.clone()]);
        let keep_workloads = BTreeSet::from([workloads[0].metadata.clone()]);
        graph.retain(&keep_services, &keep_workloads);

        assert_eq!(graph.service_count(), 1);
        assert_eq!(graph.workload_count(), 1);
        assert_eq!(graph.backing_workloads(&services[0].metadata).len(), 1);
        assert_eq!(graph.backed_services(&workloads[0].metadata).len(), 2);
    }
}
