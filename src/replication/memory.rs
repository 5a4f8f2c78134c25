//! # In-Memory Collaborators
//!
//! Process-local implementations of the remote store, the URL connector and
//! the sync engine. They keep counters and accept scripted failures, which
//! makes them suitable for tests and for running a database without a
//! network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use super::errors::{RemoteError, RemoteResult};
use super::remote::{DocumentStore, RemoteConnector};
use super::session::{StreamState, SyncConfig, SyncEngine, SyncSession, SyncStatus};
use crate::database::Collection;

/// Consume one scripted failure, if any are pending
fn take_failure(pending: &AtomicU32) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Remote document store held in memory
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Value>>,
    reads: AtomicU64,
    writes: AtomicU64,
    failing_requests: AtomicU32,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` requests fail with `RemoteError::Unavailable`
    pub fn fail_next(&self, n: u32) {
        self.failing_requests.store(n, Ordering::SeqCst);
    }

    /// Successful `put` calls so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// `get` calls so far, including failed ones
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Stored copy of a document
    pub fn document(&self, id: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Seed a document directly, bypassing revision checks and counters
    pub fn insert_raw(&self, id: impl Into<String>, document: Value) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), document);
    }

    fn next_rev(current: Option<&str>) -> String {
        let generation = current
            .and_then(|rev| rev.split('-').next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);
        format!("{}-{}", generation + 1, Uuid::new_v4().simple())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, id: &str) -> RemoteResult<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_requests) {
            return Err(RemoteError::Unavailable("scripted failure".into()));
        }
        self.document(id).ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn put(&self, mut document: Value) -> RemoteResult<String> {
        if take_failure(&self.failing_requests) {
            return Err(RemoteError::Unavailable("scripted failure".into()));
        }

        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Other("document has no _id".into()))?;
        let supplied_rev = document.get("_rev").and_then(Value::as_str).map(str::to_string);

        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        let stored_rev = documents
            .get(&id)
            .and_then(|d| d.get("_rev"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if documents.contains_key(&id) && stored_rev != supplied_rev {
            return Err(RemoteError::Conflict(id));
        }

        let rev = Self::next_rev(stored_rev.as_deref());
        if let Some(obj) = document.as_object_mut() {
            obj.insert("_rev".into(), Value::String(rev.clone()));
        }
        documents.insert(id, document);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(rev)
    }

    async fn close(&self) -> RemoteResult<()> {
        Ok(())
    }
}

/// One ad hoc connection to a shared [`MemoryDocumentStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    store: Arc<MemoryDocumentStore>,
    closed: AtomicBool,
    closes: Arc<AtomicU64>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> RemoteResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RemoteError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryConnection {
    async fn get(&self, id: &str) -> RemoteResult<Value> {
        self.ensure_open()?;
        self.store.get(id).await
    }

    async fn put(&self, document: Value) -> RemoteResult<String> {
        self.ensure_open()?;
        self.store.put(document).await
    }

    async fn close(&self) -> RemoteResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(RemoteError::Closed);
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolves every URL to the same in-memory store
#[derive(Debug)]
pub struct MemoryConnector {
    store: Arc<MemoryDocumentStore>,
    opened: AtomicU64,
    closed: Arc<AtomicU64>,
    failing_connects: AtomicU32,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryDocumentStore>) -> Self {
        Self {
            store,
            opened: AtomicU64::new(0),
            closed: Arc::new(AtomicU64::new(0)),
            failing_connects: AtomicU32::new(0),
        }
    }

    /// Make the next `n` connection attempts fail
    pub fn fail_next(&self, n: u32) {
        self.failing_connects.store(n, Ordering::SeqCst);
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, url: &str) -> RemoteResult<Arc<dyn DocumentStore>> {
        if take_failure(&self.failing_connects) {
            return Err(RemoteError::Unavailable(url.to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            store: Arc::clone(&self.store),
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closed),
        }))
    }
}

/// Session whose push/pull state is driven by the test or embedder
#[derive(Debug)]
pub struct MemorySession {
    collection: String,
    config: SyncConfig,
    activity: watch::Sender<bool>,
    status: Mutex<Option<SyncStatus>>,
    cancelled: AtomicBool,
    cancel_delay: Duration,
}

impl MemorySession {
    fn new(
        collection: String,
        config: SyncConfig,
        status: Option<SyncStatus>,
        cancel_delay: Duration,
    ) -> Self {
        let live = status.map(|s| s.is_live()).unwrap_or(false);
        let (activity, _) = watch::channel(live);
        Self {
            collection,
            config,
            activity,
            status: Mutex::new(status),
            cancelled: AtomicBool::new(false),
            cancel_delay,
        }
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Change the push/pull state and notify watchers
    pub fn set_status(&self, push: StreamState, pull: StreamState) {
        let status = SyncStatus::new(push, pull);
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
        self.activity.send_modify(|active| *active = status.is_live());
    }

    /// Drop the status snapshot and notify watchers
    pub fn clear_status(&self) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.activity.send_modify(|active| *active = false);
    }
}

#[async_trait]
impl SyncSession for MemorySession {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn activity(&self) -> watch::Receiver<bool> {
        self.activity.subscribe()
    }

    fn status(&self) -> Option<SyncStatus> {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn cancel(&self) -> RemoteResult<()> {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.cancel_delay.is_zero() {
            tokio::time::sleep(self.cancel_delay).await;
        }
        self.set_status(StreamState::Stopped, StreamState::Stopped);
        Ok(())
    }
}

/// Sync engine producing [`MemorySession`]s
#[derive(Debug)]
pub struct MemorySyncEngine {
    initial_status: Option<SyncStatus>,
    cancel_delay: Duration,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    failing_collections: Mutex<HashSet<String>>,
}

impl Default for MemorySyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySyncEngine {
    /// Engine whose sessions start with push and pull active
    pub fn new() -> Self {
        Self::with_initial_status(Some(SyncStatus::new(StreamState::Active, StreamState::Active)))
    }

    pub fn with_initial_status(initial_status: Option<SyncStatus>) -> Self {
        Self {
            initial_status,
            cancel_delay: Duration::ZERO,
            sessions: Mutex::new(Vec::new()),
            failing_collections: Mutex::new(HashSet::new()),
        }
    }

    /// Make every session take `delay` to cancel, like a remote round trip
    pub fn with_cancel_delay(mut self, delay: Duration) -> Self {
        self.cancel_delay = delay;
        self
    }

    /// Make every future open for `collection` fail
    pub fn fail_collection(&self, collection: impl Into<String>) {
        self.failing_collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.into());
    }

    /// Allow `collection` to open again
    pub fn heal_collection(&self, collection: &str) {
        self.failing_collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection);
    }

    /// Every session ever opened, in order
    pub fn sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Sessions not yet cancelled
    pub fn open_sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions()
            .into_iter()
            .filter(|s| !s.is_cancelled())
            .collect()
    }

    /// Most recently opened session for `collection`
    pub fn latest(&self, collection: &str) -> Option<Arc<MemorySession>> {
        self.sessions()
            .into_iter()
            .rev()
            .find(|s| s.collection == collection)
    }
}

#[async_trait]
impl SyncEngine for MemorySyncEngine {
    async fn open(
        &self,
        collection: Arc<Collection>,
        config: SyncConfig,
    ) -> RemoteResult<Arc<dyn SyncSession>> {
        let name = collection.name().to_string();
        let failing = self
            .failing_collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&name);
        if failing {
            return Err(RemoteError::Unavailable(format!("cannot sync {}", name)));
        }

        let session = Arc::new(MemorySession::new(
            name,
            config,
            self.initial_status,
            self.cancel_delay,
        ));
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&session));
        Ok(session)
    }
}
