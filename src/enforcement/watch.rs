//! Polling watch over virtual meshes.
//!
//! Successive store listings are diffed into lifecycle events. The store
//! fingerprint short-circuits polls when nothing changed; any change
//! re-emits every surviving virtual mesh as updated, because a topology
//! change under an unchanged virtual mesh still needs a new cycle.
//!
//! A removed virtual mesh stays pending until its deletion is acknowledged,
//! and every poll that reads the store re-emits the pending deletions.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::model::{ObjectRef, VirtualMesh};
use crate::store::ResourceStore;

use super::orchestrator::PolicyGroupEvent;

/// Turns store snapshots into virtual mesh events.
#[derive(Debug, Default)]
pub struct PolicyGroupWatcher {
    known: BTreeMap<ObjectRef, VirtualMesh>,
    pending_deletions: BTreeMap<ObjectRef, VirtualMesh>,
    last_fingerprint: Option<String>,
}

impl PolicyGroupWatcher {
    /// Creates a watcher that has seen nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Polls the store once.
    ///
    /// Returns no events when the store fingerprint is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. The watcher state is
    /// left untouched so the next poll retries.
    pub async fn poll(&mut self, store: &dyn ResourceStore) -> Result<Vec<PolicyGroupEvent>> {
        let fingerprint = store.fingerprint().await?;
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!("Store unchanged ({fingerprint})");
            return Ok(Vec::new());
        }

        let current = store.list_virtual_meshes().await?;
        let events = self.diff(current);
        self.last_fingerprint = Some(fingerprint);
        Ok(events)
    }

    /// Forces the next poll to re-emit every known virtual mesh and every
    /// unacknowledged deletion.
    pub fn force_resync(&mut self) {
        self.last_fingerprint = None;
    }

    /// Marks an event as handled. Deletions are re-emitted until acknowledged.
    pub fn acknowledge(&mut self, event: &PolicyGroupEvent) {
        if let PolicyGroupEvent::Deleted(vm) = event {
            self.pending_deletions.remove(&vm.metadata);
        }
    }

    /// Number of deletions not yet acknowledged.
    #[must_use]
    pub fn pending_deletions(&self) -> usize {
        self.pending_deletions.len()
    }

    /// Number of virtual meshes currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.known.len()
    }

    fn diff(&mut self, current: Vec<VirtualMesh>) -> Vec<PolicyGroupEvent> {
        let next: BTreeMap<ObjectRef, VirtualMesh> = current
            .into_iter()
            .map(|mut vm| {
                vm.status = None;
                (vm.metadata.clone(), vm)
            })
            .collect();

        for (metadata, previous) in &self.known {
            if !next.contains_key(metadata) {
                self.pending_deletions.insert(metadata.clone(), previous.clone());
            }
        }
        self.pending_deletions
            .retain(|metadata, _| !next.contains_key(metadata));

        let mut events: Vec<PolicyGroupEvent> = self
            .pending_deletions
            .values()
            .map(|previous| PolicyGroupEvent::Deleted(previous.clone()))
            .collect();

        for (metadata, vm) in &next {
            if self.known.contains_key(metadata) {
                events.push(PolicyGroupEvent::Updated(vm.clone()));
            } else {
                events.push(PolicyGroupEvent::Created(vm.clone()));
            }
        }

        self.known = next;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnforcementPolicy;
    use crate::testutil::MemoryStore;

    fn vm(name: &str) -> VirtualMesh {
        VirtualMesh {
            metadata: ObjectRef::new(name, "mesh-system"),
            meshes: vec![],
            enforce_access_control: EnforcementPolicy::MeshDefault,
            status: None,
        }
    }

    fn kinds(events: &[PolicyGroupEvent]) -> Vec<(&'static str, String)> {
        events
            .iter()
            .map(|e| (e.kind(), e.virtual_mesh().metadata.name.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_first_poll_creates_everything() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));
        store.add_virtual_mesh(vm("b"));

        let mut watcher = PolicyGroupWatcher::new();
        let events = watcher.poll(&store).await.expect("poll");

        assert_eq!(
            kinds(&events),
            vec![("created", String::from("a")), ("created", String::from("b"))]
        );
        assert_eq!(watcher.tracked(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_store_yields_nothing() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));

        let mut watcher = PolicyGroupWatcher::new();
        watcher.poll(&store).await.expect("first poll");
        let events = watcher.poll(&store).await.expect("second poll");

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_removal_and_addition_are_diffed() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));
        store.add_virtual_mesh(vm("b"));

        let mut watcher = PolicyGroupWatcher::new();
        watcher.poll(&store).await.expect("first poll");

        store.remove_virtual_mesh(&ObjectRef::new("a", "mesh-system"));
        store.add_virtual_mesh(vm("c"));
        let events = watcher.poll(&store).await.expect("second poll");

        assert_eq!(
            kinds(&events),
            vec![
                ("deleted", String::from("a")),
                ("updated", String::from("b")),
                ("created", String::from("c")),
            ]
        );
    }

    #[tokio::test]
    async fn test_force_resync_re_emits() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));

        let mut watcher = PolicyGroupWatcher::new();
        watcher.poll(&store).await.expect("first poll");
        watcher.force_resync();
        let events = watcher.poll(&store).await.expect("second poll");

        assert_eq!(kinds(&events), vec![("updated", String::from("a"))]);
    }

    #[tokio::test]
    async fn test_unacknowledged_deletion_is_re_emitted_after_resync() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));
        store.add_virtual_mesh(vm("b"));

        let mut watcher = PolicyGroupWatcher::new();
        watcher.poll(&store).await.expect("first poll");

        store.remove_virtual_mesh(&ObjectRef::new("a", "mesh-system"));
        let events = watcher.poll(&store).await.expect("second poll");
        assert_eq!(events[0].kind(), "deleted");

        // Handling failed: nothing acknowledged.
        watcher.force_resync();
        let events = watcher.poll(&store).await.expect("third poll");
        assert_eq!(
            kinds(&events),
            vec![("deleted", String::from("a")), ("updated", String::from("b"))]
        );
        assert_eq!(watcher.pending_deletions(), 1);

        for event in &events {
            watcher.acknowledge(event);
        }
        watcher.force_resync();
        let events = watcher.poll(&store).await.expect("fourth poll");
        assert_eq!(kinds(&events), vec![("updated", String::from("b"))]);
        assert_eq!(watcher.pending_deletions(), 0);
    }

    #[tokio::test]
    async fn test_recreated_virtual_mesh_drops_pending_deletion() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));

        let mut watcher = PolicyGroupWatcher::new();
        watcher.poll(&store).await.expect("first poll");
        store.remove_virtual_mesh(&ObjectRef::new("a", "mesh-system"));
        watcher.poll(&store).await.expect("second poll");

        store.add_virtual_mesh(vm("a"));
        let events = watcher.poll(&store).await.expect("third poll");

        assert_eq!(kinds(&events), vec![("created", String::from("a"))]);
        assert_eq!(watcher.pending_deletions(), 0);
    }

    #[test]
    fn test_store_errors_leave_state_untouched() {
        let store = MemoryStore::default();
        store.add_virtual_mesh(vm("a"));
        store.fail_lists("offline");

        let mut watcher = PolicyGroupWatcher::new();
        let result = tokio_test::block_on(watcher.poll(&store));

        assert!(result.is_err());
        assert_eq!(watcher.tracked(), 0);
    }
}
