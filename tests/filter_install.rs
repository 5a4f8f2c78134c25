//! Filter Installation Tests
//!
//! Versioned design document on the remote store:
//! - Created when absent
//! - Upgraded with the stored revision token when older
//! - Left alone when the same version or newer
//! - Ad hoc URL connections are always closed again

use std::sync::Arc;

use aerodb_sync::replication::memory::{MemoryConnector, MemoryDocumentStore};
use aerodb_sync::replication::{
    DocumentStore, FilterDocument, FilterInstaller, InstallOutcome, RemoteConnector, RemoteError,
    RemoteTarget, DESIGN_DOC_ID, FILTER_BY_MODEL, FILTER_BY_MODEL_AND_USER_ID,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<MemoryDocumentStore>, RemoteTarget) {
    let store = Arc::new(MemoryDocumentStore::new());
    let target = RemoteTarget::handle(store.clone());
    (store, target)
}

fn stored(store: &MemoryDocumentStore) -> FilterDocument {
    serde_json::from_value(store.document(DESIGN_DOC_ID).unwrap()).unwrap()
}

// =============================================================================
// Version Handling Tests
// =============================================================================

/// Absent document is created at the candidate version.
#[tokio::test]
async fn test_install_creates_missing_document() {
    let (store, target) = setup();

    let outcome = FilterInstaller::new(1).install(&target, None).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Created);

    let doc = stored(&store);
    assert_eq!(doc.version, 1);
    assert!(doc.rev.is_some());
    assert!(doc.filters.contains_key(FILTER_BY_MODEL));
    assert!(doc.filters[FILTER_BY_MODEL_AND_USER_ID].contains("req.query[\"user_id\"]"));
}

/// Second install of the same version writes nothing.
#[tokio::test]
async fn test_same_version_is_unchanged() {
    let (store, target) = setup();
    let installer = FilterInstaller::new(1);

    installer.install(&target, None).await.unwrap();
    let outcome = installer.install(&target, None).await.unwrap();

    assert_eq!(outcome, InstallOutcome::Unchanged { stored: 1 });
    assert_eq!(store.write_count(), 1);
}

/// Older document is replaced using its revision token.
#[tokio::test]
async fn test_older_version_is_upgraded() {
    let (store, target) = setup();
    FilterInstaller::new(1).install(&target, None).await.unwrap();
    let old_rev = stored(&store).rev.unwrap();

    let outcome = FilterInstaller::new(2).install(&target, None).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Updated { from: 1 });

    let doc = stored(&store);
    assert_eq!(doc.version, 2);
    assert_ne!(doc.rev.unwrap(), old_rev);
    assert_eq!(store.write_count(), 2);
}

/// Newer document on the remote is never downgraded.
#[tokio::test]
async fn test_newer_version_is_kept() {
    let (store, target) = setup();
    FilterInstaller::new(5).install(&target, None).await.unwrap();

    let outcome = FilterInstaller::new(1).install(&target, None).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Unchanged { stored: 5 });
    assert_eq!(stored(&store).version, 5);
}

/// A document without a version field is treated as version 0.
#[tokio::test]
async fn test_unversioned_document_is_upgraded() {
    let (store, target) = setup();
    store.insert_raw(
        DESIGN_DOC_ID,
        json!({ "_id": DESIGN_DOC_ID, "_rev": "1-legacy", "filters": {} }),
    );

    let outcome = FilterInstaller::new(1).install(&target, None).await.unwrap();
    assert_eq!(outcome, InstallOutcome::Updated { from: 0 });
    assert_eq!(stored(&store).version, 1);
}

// =============================================================================
// Failure Tests
// =============================================================================

/// Read failures other than not-found are returned as-is.
#[tokio::test]
async fn test_read_failure_propagates() {
    let (store, target) = setup();
    store.fail_next(1);

    let err = FilterInstaller::default().install(&target, None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
    assert!(store.document(DESIGN_DOC_ID).is_none());
}

// =============================================================================
// Connection Handling Tests
// =============================================================================

/// URL targets are opened per install and closed afterwards.
#[tokio::test]
async fn test_url_target_connection_is_closed() {
    let store = Arc::new(MemoryDocumentStore::new());
    let connector = MemoryConnector::new(store.clone());
    let target = RemoteTarget::url("mem://remote/app");
    let connector_ref: &dyn RemoteConnector = &connector;

    for _ in 0..2 {
        FilterInstaller::default()
            .install(&target, Some(connector_ref))
            .await
            .unwrap();
    }

    assert_eq!(connector.opened(), 2);
    assert_eq!(connector.closed(), 2);
    assert_eq!(store.write_count(), 1);
}

/// The connection is closed even when installation fails.
#[tokio::test]
async fn test_url_target_closed_on_failure() {
    let store = Arc::new(MemoryDocumentStore::new());
    let connector = MemoryConnector::new(store.clone());
    store.fail_next(1);

    let connector_ref: &dyn RemoteConnector = &connector;

    let result = FilterInstaller::default()
        .install(&RemoteTarget::url("mem://remote/app"), Some(connector_ref))
        .await;
    assert!(result.is_err());
    assert_eq!(connector.closed(), 1);
}

/// Live handles are never closed by the installer.
#[tokio::test]
async fn test_handle_target_stays_open() {
    let store = Arc::new(MemoryDocumentStore::new());
    let connector = MemoryConnector::new(store.clone());
    let conn = connector.connect("mem://remote/app").await.unwrap();
    let target = RemoteTarget::handle(conn.clone());

    FilterInstaller::default().install(&target, None).await.unwrap();
    assert_eq!(connector.closed(), 0);
    assert!(conn.get(DESIGN_DOC_ID).await.is_ok());
}

/// URL targets without a connector cannot be reached.
#[tokio::test]
async fn test_url_target_without_connector_fails() {
    let err = FilterInstaller::default()
        .install(&RemoteTarget::url("mem://remote/app"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Other(_)));
}
