//! # Replication Group
//!
//! Supervises the filtered sync sessions of a set of collections against one
//! remote target.
//!
//! ```text
//!            connect()                install ok, sessions open
//!   Idle ───────────────► Connecting ─────────────────────────► Active
//!                              │                                  ▲
//!                              │ install failed                   │ install ok
//!                              ▼                                  │
//!                          Retrying ──── every retry interval ────┘
//!
//!   close(): any ──► Closed          destroy(): any ──► Destroyed (terminal)
//! ```
//!
//! `connect()` always tears the previous sync state down first, so a group
//! never runs two generations of sessions at once.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use super::config::ReplicationOptions;
use super::errors::{RemoteResult, ReplicationError, ReplicationResult};
use super::filter::{FilterInstaller, InstallOutcome};
use super::liveness::LivenessAggregator;
use super::registry::ReplicationRegistry;
use super::remote::{RemoteConnector, RemoteTarget};
use super::session::{cancel_all, open_sessions, SyncDirection, SyncEngine, SyncSession};
use crate::database::Collection;
use crate::observability::{
    log_event, log_recoverable, Event, Logger, MetricsSnapshot, ReplicationMetrics,
};

/// Lifecycle state of a replication group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Created, never connected
    Idle,
    /// Installing the filter or opening sessions
    Connecting,
    /// Sessions open and watched
    Active,
    /// Filter installation failed; polling
    Retrying,
    /// Torn down; `connect()` may be called again
    Closed,
    /// Torn down and removed from its registry
    Destroyed,
}

impl GroupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupState::Idle => "idle",
            GroupState::Connecting => "connecting",
            GroupState::Active => "active",
            GroupState::Retrying => "retrying",
            GroupState::Closed => "closed",
            GroupState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Default)]
struct SyncState {
    sessions: Vec<Arc<dyn SyncSession>>,
    aggregator: Option<LivenessAggregator>,
}

/// Collaborators a group needs to reach the remote
#[derive(Clone)]
pub struct ReplicationBackend {
    pub engine: Arc<dyn SyncEngine>,
    pub connector: Option<Arc<dyn RemoteConnector>>,
}

impl ReplicationBackend {
    pub fn new(engine: Arc<dyn SyncEngine>) -> Self {
        Self {
            engine,
            connector: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }
}

/// A supervised set of filtered sync sessions with one activity signal
pub struct ReplicationGroup {
    id: Uuid,
    remote: RemoteTarget,
    collections: Vec<Arc<Collection>>,
    direction: SyncDirection,
    options: ReplicationOptions,
    installer: FilterInstaller,
    backend: ReplicationBackend,
    registry: Option<Weak<ReplicationRegistry>>,

    active: Arc<watch::Sender<bool>>,
    state: watch::Sender<GroupState>,
    /// Serializes connect, close and retry recovery
    sync: AsyncMutex<SyncState>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    metrics: ReplicationMetrics,
}

impl ReplicationGroup {
    /// Create an idle group.
    ///
    /// Groups created through [`crate::Database::replicate`] are registered
    /// with the database; `registry` is `None` for standalone groups.
    pub fn new(
        remote: RemoteTarget,
        collections: Vec<Arc<Collection>>,
        direction: SyncDirection,
        options: ReplicationOptions,
        backend: ReplicationBackend,
        registry: Option<Weak<ReplicationRegistry>>,
    ) -> ReplicationResult<Arc<Self>> {
        options.validate()?;
        if remote.is_url() && backend.connector.is_none() {
            return Err(ReplicationError::configuration_error(format!(
                "remote {} is a URL but no connector is configured",
                remote
            )));
        }

        let (active, _) = watch::channel(false);
        let (state, _) = watch::channel(GroupState::Idle);

        Ok(Arc::new(Self {
            id: Uuid::new_v4(),
            remote,
            collections,
            direction,
            installer: FilterInstaller::new(options.filter_version),
            options,
            backend,
            registry,
            active: Arc::new(active),
            state,
            sync: AsyncMutex::new(SyncState::default()),
            retry_task: Mutex::new(None),
            metrics: ReplicationMetrics::new(),
        }))
    }

    /// Stable registry key
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn remote(&self) -> &RemoteTarget {
        &self.remote
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    pub fn options(&self) -> &ReplicationOptions {
        &self.options
    }

    /// Replicated collection names, in session order
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name()).collect()
    }

    /// Whether every session currently pushes and pulls
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Stream of activity changes
    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    pub fn state(&self) -> GroupState {
        *self.state.borrow()
    }

    /// Stream of lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<GroupState> {
        self.state.subscribe()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == GroupState::Destroyed
    }

    /// Whether the filter retry loop is scheduled
    pub fn is_retrying(&self) -> bool {
        self.retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Number of open sync sessions
    pub async fn session_count(&self) -> usize {
        self.sync.lock().await.sessions.len()
    }

    /// Liveness flags, index-aligned with the sessions
    pub async fn liveness_flags(&self) -> Vec<bool> {
        let sync = self.sync.lock().await;
        sync.aggregator.as_ref().map(|a| a.flags()).unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tear down, install the filter, and open sessions.
    ///
    /// Returns `Ok(true)` when sessions are open and `Ok(false)` when the
    /// filter could not be installed and the retry loop has taken over. A
    /// session that fails to open is returned as an error and is not retried.
    pub async fn connect(self: &Arc<Self>) -> ReplicationResult<bool> {
        if self.is_destroyed() {
            return Err(ReplicationError::destroyed());
        }

        let group = self.id.to_string();
        self.metrics.increment_connect_attempts();
        log_event(
            Event::ConnectBegin,
            &[("group", &group), ("remote", &self.remote.to_string())],
        );

        let mut sync = self.sync.lock().await;
        // destroy() may have finished while this call waited for the lock
        if self.is_destroyed() {
            return Err(ReplicationError::destroyed());
        }
        self.close_locked(&mut sync).await;
        self.set_state(GroupState::Connecting);

        match self.install_filter().await {
            Ok(_) => {
                self.activate(&mut sync).await?;
                Ok(true)
            }
            Err(e) => {
                log_recoverable(
                    self.options.environment,
                    Event::FilterInstallFailed,
                    &[("group", &group), ("reason", &e.to_string())],
                );
                self.set_state(GroupState::Retrying);
                self.schedule_retry();
                Ok(false)
            }
        }
    }

    /// Stop the retry loop and every session. Idempotent.
    pub async fn close(&self) {
        let mut sync = self.sync.lock().await;
        self.close_locked(&mut sync).await;
    }

    /// Close and remove this group from its registry. Terminal.
    pub async fn destroy(&self) {
        {
            let mut sync = self.sync.lock().await;
            self.destroy_locked(&mut sync).await;
        }

        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            registry.remove(self.id);
        }
        log_event(Event::Destroyed, &[("group", &self.id.to_string())]);
    }

    async fn close_locked(&self, sync: &mut SyncState) {
        let group = self.id.to_string();
        Logger::trace(Event::CloseBegin.as_str(), &[("group", &group)]);

        if let Some(task) = self
            .retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }

        // Dropping the aggregator clears the flags and resets the signal
        if let Some(aggregator) = sync.aggregator.take() {
            aggregator.shutdown();
        }
        self.active.send_if_modified(|active| std::mem::replace(active, false));

        let sessions = std::mem::take(&mut sync.sessions);
        if !sessions.is_empty() {
            let cancelled = cancel_all(&sessions).await;
            self.metrics.add_sessions_cancelled(cancelled as u64);
        }

        self.set_state(GroupState::Closed);
        Logger::trace(Event::CloseComplete.as_str(), &[("group", &group)]);
    }

    /// Tear down and mark Destroyed under the same lock, so no connect()
    /// waiting behind it can open sessions afterwards
    async fn destroy_locked(&self, sync: &mut SyncState) {
        self.close_locked(sync).await;
        self.set_state(GroupState::Destroyed);
    }

    async fn install_filter(&self) -> RemoteResult<InstallOutcome> {
        Logger::trace(
            Event::FilterInstallBegin.as_str(),
            &[
                ("group", &self.id.to_string()),
                ("version", &self.installer.version().to_string()),
            ],
        );

        let result = self
            .installer
            .install(&self.remote, self.backend.connector.as_deref())
            .await;
        match &result {
            Ok(_) => self.metrics.increment_filter_installs(),
            Err(_) => self.metrics.increment_filter_install_failures(),
        }
        result
    }

    /// Open sessions and wire the aggregator. Leaves the group Closed on error.
    async fn activate(&self, sync: &mut SyncState) -> ReplicationResult<()> {
        let sessions = match open_sessions(
            self.backend.engine.as_ref(),
            &self.collections,
            &self.remote,
            self.direction,
            &self.options,
        )
        .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                self.set_state(GroupState::Closed);
                return Err(e);
            }
        };

        self.metrics.add_sessions_opened(sessions.len() as u64);
        sync.aggregator = Some(LivenessAggregator::spawn(
            &sessions,
            self.options.settle_delay(),
            Arc::clone(&self.active),
        ));
        sync.sessions = sessions;

        self.set_state(GroupState::Active);
        log_event(
            Event::ConnectComplete,
            &[("group", &self.id.to_string()), ("sessions", &sync.sessions.len().to_string())],
        );
        Ok(())
    }

    fn schedule_retry(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.options.retry_interval();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                // Group dropped without close(); nothing left to recover
                let Some(group) = weak.upgrade() else { break };
                if group.retry_once().await {
                    break;
                }
            }
        });

        Logger::info(
            Event::RetryScheduled.as_str(),
            &[
                ("group", &self.id.to_string()),
                ("interval_ms", &self.options.retry_interval_ms.to_string()),
            ],
        );
        *self.retry_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// One retry tick. Returns true when the loop should stop.
    async fn retry_once(&self) -> bool {
        let group = self.id.to_string();
        self.metrics.increment_retry_attempts();
        Logger::trace(Event::RetryAttempt.as_str(), &[("group", &group)]);

        if let Err(e) = self.install_filter().await {
            log_recoverable(
                self.options.environment,
                Event::FilterInstallFailed,
                &[("group", &group), ("reason", &e.to_string())],
            );
            return false;
        }

        let mut sync = self.sync.lock().await;
        // The timer is done either way; close() must not abort a finished loop
        self.retry_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.is_destroyed() {
            return true;
        }

        match self.activate(&mut sync).await {
            Ok(()) => log_event(Event::RetryRecovered, &[("group", &group)]),
            Err(e) => log_recoverable(
                self.options.environment,
                Event::RetrySessionOpenFailed,
                &[("group", &group), ("reason", &e.message)],
            ),
        }
        true
    }

    fn set_state(&self, next: GroupState) {
        self.state.send_if_modified(|state| {
            if *state == GroupState::Destroyed || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

impl fmt::Debug for ReplicationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationGroup")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("collections", &self.collection_names())
            .field("direction", &self.direction)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for ReplicationGroup {
    fn drop(&mut self) {
        if let Some(task) = self
            .retry_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
