//! # Replication Registry
//!
//! Database-scoped list of live replication groups.
//!
//! Membership is keyed by each group's `Uuid`, so destroying one group never
//! disturbs the others regardless of creation order. Listing preserves
//! registration order.

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use uuid::Uuid;

use super::group::ReplicationGroup;

#[derive(Debug, Default)]
pub struct ReplicationRegistry {
    groups: RwLock<Vec<Arc<ReplicationGroup>>>,
}

impl ReplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group. Registering the same group twice is a no-op.
    pub fn register(&self, group: Arc<ReplicationGroup>) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if !groups.iter().any(|g| g.id() == group.id()) {
            groups.push(group);
        }
    }

    /// Remove the group with `id`, returning it if it was registered
    pub fn remove(&self, id: Uuid) -> Option<Arc<ReplicationGroup>> {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let position = groups.iter().position(|g| g.id() == id)?;
        Some(groups.remove(position))
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<ReplicationGroup>> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|g| g.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<Uuid> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|g| g.id())
            .collect()
    }

    /// Snapshot of the registered groups
    pub fn all(&self) -> Vec<Arc<ReplicationGroup>> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every registered group. Returns how many were destroyed.
    pub async fn destroy_all(&self) -> usize {
        let groups = self.all();
        join_all(groups.iter().map(|g| g.destroy())).await;

        // Groups registered without a back-reference are dropped here
        let mut remaining = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        remaining.retain(|g| !groups.iter().any(|d| d.id() == g.id()));
        groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_survive_poisoned_lock() {
        let registry = Arc::new(ReplicationRegistry::new());
        let writer = Arc::clone(&registry);
        let result = std::thread::spawn(move || {
            let _guard = writer.groups.write().unwrap();
            panic!("writer panicked while holding the lock");
        })
        .join();

        assert!(result.is_err());
        assert!(registry.groups.is_poisoned());
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
        assert!(registry.ids().is_empty());
    }
}
