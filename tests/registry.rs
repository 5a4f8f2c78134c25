//! Replication Registry Tests
//!
//! Database-scoped bookkeeping of replication groups:
//! - replicate() registers the group it returns
//! - destroy() removes exactly that group, whatever the creation order
//! - destroy_replications() tears every group down

use std::collections::HashMap;
use std::sync::Arc;

use aerodb_sync::database::ReplicationFields;
use aerodb_sync::replication::memory::{MemoryDocumentStore, MemorySyncEngine};
use aerodb_sync::replication::{
    GroupState, RemoteTarget, ReplicationBackend, ReplicationGroup, ReplicationOptions,
    ReplicationRegistry, SyncDirection,
};
use aerodb_sync::schema::Schema;
use aerodb_sync::Database;

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    db: Database,
    engine: Arc<MemorySyncEngine>,
    store: Arc<MemoryDocumentStore>,
}

fn setup() -> Fixture {
    let engine = Arc::new(MemorySyncEngine::new());
    let db = Database::builder()
        .hook(ReplicationFields)
        .replication_backend(ReplicationBackend::new(engine.clone()))
        .build();
    db.create_collection("tasks", Schema::new(HashMap::new())).unwrap();
    db.create_collection("notes", Schema::new(HashMap::new())).unwrap();

    Fixture {
        db,
        engine,
        store: Arc::new(MemoryDocumentStore::new()),
    }
}

async fn start(fx: &Fixture, names: &[&str]) -> Arc<ReplicationGroup> {
    fx.db
        .replicate(
            RemoteTarget::handle(fx.store.clone()),
            Some(names),
            SyncDirection::Both,
            ReplicationOptions::for_user("u1"),
        )
        .await
        .unwrap()
}

// =============================================================================
// Registration Tests
// =============================================================================

/// Groups are listed in creation order.
#[tokio::test]
async fn test_replicate_registers_groups() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;
    let b = start(&fx, &["notes"]).await;

    let ids: Vec<_> = fx.db.replications().iter().map(|g| g.id()).collect();
    assert_eq!(ids, vec![a.id(), b.id()]);
    assert!(fx.db.registry().contains(a.id()));
}

/// Registering the same group twice keeps one entry.
#[tokio::test]
async fn test_register_is_idempotent() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;

    fx.db.registry().register(a.clone());
    assert_eq!(fx.db.registry().len(), 1);
}

// =============================================================================
// Destroy Tests
// =============================================================================

/// Destroying the first of three removes only that one.
#[tokio::test]
async fn test_destroy_first_leaves_others() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;
    let b = start(&fx, &["notes"]).await;
    let c = start(&fx, &["tasks", "notes"]).await;

    a.destroy().await;

    assert_eq!(fx.db.registry().ids(), vec![b.id(), c.id()]);
    assert_eq!(a.state(), GroupState::Destroyed);
    assert_eq!(b.state(), GroupState::Active);
    assert_eq!(c.state(), GroupState::Active);
}

/// Destroying out of creation order still removes the right groups.
#[tokio::test]
async fn test_destroy_out_of_order() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;
    let b = start(&fx, &["notes"]).await;
    let c = start(&fx, &["tasks"]).await;

    b.destroy().await;
    a.destroy().await;
    assert_eq!(fx.db.registry().ids(), vec![c.id()]);

    // Destroying again is harmless
    a.destroy().await;
    assert_eq!(fx.db.registry().ids(), vec![c.id()]);
}

/// Destroy cancels the group's sessions and nobody else's.
#[tokio::test]
async fn test_destroy_cancels_only_own_sessions() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;
    let _b = start(&fx, &["notes"]).await;

    a.destroy().await;

    let open: Vec<_> = fx
        .engine
        .open_sessions()
        .iter()
        .map(|s| s.config().query_params.model.clone())
        .collect();
    assert_eq!(open, vec!["notes".to_string()]);
}

/// destroy_replications() empties the registry and closes everything.
#[tokio::test]
async fn test_destroy_all() {
    let fx = setup();
    let a = start(&fx, &["tasks"]).await;
    let b = start(&fx, &["notes"]).await;

    assert_eq!(fx.db.destroy_replications().await, 2);
    assert!(fx.db.replications().is_empty());
    assert!(fx.engine.open_sessions().is_empty());
    assert!(a.is_destroyed());
    assert!(b.is_destroyed());

    assert_eq!(fx.db.destroy_replications().await, 0);
}

/// Standalone groups can be tracked by a registry they do not point back to.
#[tokio::test]
async fn test_destroy_all_drops_standalone_groups() {
    let fx = setup();
    let registry = ReplicationRegistry::new();
    let group = ReplicationGroup::new(
        RemoteTarget::handle(fx.store.clone()),
        vec![fx.db.collection("tasks").unwrap()],
        SyncDirection::Both,
        ReplicationOptions::default(),
        ReplicationBackend::new(fx.engine.clone()),
        None,
    )
    .unwrap();
    registry.register(group.clone());

    assert!(group.connect().await.unwrap());
    assert_eq!(registry.destroy_all().await, 1);
    assert!(registry.is_empty());
    assert!(group.is_destroyed());
}
