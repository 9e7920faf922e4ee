//! Label and reference selectors.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TopologyError};
use crate::model::{LabelMatcher, MeshService, MeshWorkload, ObjectRef, ServiceSelector, WorkloadSelector};

/// Returns true if every `selector` label is present in `labels` with an
/// equal value, and neither set is empty.
///
/// This is whitelist containment, not label equality: `labels` may carry
/// extra keys.
#[must_use]
pub fn labels_whitelisted(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    if selector.is_empty() || labels.is_empty() {
        return false;
    }

    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

impl LabelMatcher {
    /// Checks labels and namespace against this matcher.
    ///
    /// Unlike [`labels_whitelisted`], an empty matcher matches everything.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>, namespace: &str) -> bool {
        let namespace_ok =
            self.namespaces.is_empty() || self.namespaces.iter().any(|ns| ns == namespace);

        namespace_ok
            && self
                .labels
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Resolves a destination selector to the services it selects.
///
/// `None` selects every service in `services`.
///
/// # Errors
///
/// Returns an error if the selector is malformed or references a service
/// that does not exist.
pub fn select_services(
    selector: Option<&ServiceSelector>,
    services: &[MeshService],
    policy: &ObjectRef,
) -> Result<BTreeSet<ObjectRef>> {
    let Some(selector) = selector else {
        return Ok(services.iter().map(|s| s.metadata.clone()).collect());
    };

    match selector {
        ServiceSelector::Matcher(matcher) => Ok(services
            .iter()
            .filter(|s| matcher.matches(&s.labels, &s.kube_service.namespace))
            .map(|s| s.metadata.clone())
            .collect()),

        ServiceSelector::ServiceRefs(refs) => {
            if refs.is_empty() {
                return Err(TopologyError::InvalidSelector {
                    policy: policy.to_string(),
                    message: String::from("serviceRefs must not be empty"),
                }
                .into());
            }

            let mut selected = BTreeSet::new();
            for service_ref in refs {
                let matching: Vec<&MeshService> = services
                    .iter()
                    .filter(|s| {
                        s.kube_service.name == service_ref.name
                            && s.kube_service.namespace == service_ref.namespace
                    })
                    .collect();

                if matching.is_empty() {
                    return Err(TopologyError::SelectorTargetNotFound {
                        kind: "Service",
                        name: service_ref.name.clone(),
                        namespace: service_ref.namespace.clone(),
                    }
                    .into());
                }

                selected.extend(matching.into_iter().map(|s| s.metadata.clone()));
            }

            Ok(selected)
        }
    }
}

/// Resolves a source selector to the workloads it selects.
///
/// `None` selects every workload in `workloads`.
///
/// # Errors
///
/// Returns an error if the selector is malformed.
pub fn select_workloads(
    selector: Option<&WorkloadSelector>,
    workloads: &[MeshWorkload],
    policy: &ObjectRef,
) -> Result<BTreeSet<ObjectRef>> {
    let Some(selector) = selector else {
        return Ok(workloads.iter().map(|w| w.metadata.clone()).collect());
    };

    match selector {
        WorkloadSelector::Matcher(matcher) => Ok(workloads
            .iter()
            .filter(|w| matcher.matches(&w.labels, w.pod_namespace()))
            .map(|w| w.metadata.clone())
            .collect()),

        WorkloadSelector::ServiceAccounts(refs) => {
            if refs.is_empty() {
                return Err(TopologyError::InvalidSelector {
                    policy: policy.to_string(),
                    message: String::from("serviceAccounts must not be empty"),
                }
                .into());
            }

            Ok(workloads
                .iter()
                .filter(|w| {
                    refs.iter().any(|sa| {
                        w.service_account.as_deref() == Some(sa.name.as_str())
                            && w.pod_namespace() == sa.namespace
                    })
                })
                .map(|w| w.metadata.clone())
                .collect())
        }
    }
}
