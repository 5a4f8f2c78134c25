//! # Sync Sessions
//!
//! One live, filtered, bidirectional replication stream per collection.
//! Sessions are opened by an external [`SyncEngine`]; this module builds the
//! per-collection configuration and opens the whole set.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::config::ReplicationOptions;
use super::errors::{RemoteResult, ReplicationError, ReplicationResult};
use super::filter::{FILTER_BY_MODEL_AND_USER_ID, MODEL_PARAM, USER_ID_PARAM};
use super::remote::RemoteTarget;
use crate::database::Collection;
use crate::observability::{log_event, Event};

/// Which way documents flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Local to remote only
    Push,
    /// Remote to local only
    Pull,
    /// Both ways
    #[default]
    Both,
}

/// State of one half (push or pull) of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Pending,
    Active,
    Paused,
    Stopped,
}

/// Push/pull status snapshot of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub push: StreamState,
    pub pull: StreamState,
}

impl SyncStatus {
    pub fn new(push: StreamState, pull: StreamState) -> Self {
        Self { push, pull }
    }

    /// Neither half has stopped
    pub fn is_live(&self) -> bool {
        self.push != StreamState::Stopped && self.pull != StreamState::Stopped
    }
}

/// Query parameters handed to the server-side filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQuery {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SyncQuery {
    /// As the request query map seen by the filter
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(MODEL_PARAM.into(), Value::String(self.model.clone()));
        if let Some(user_id) = &self.user_id {
            map.insert(USER_ID_PARAM.into(), Value::String(user_id.clone()));
        }
        map
    }
}

/// Everything a sync engine needs to open one session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub remote: RemoteTarget,
    pub direction: SyncDirection,
    pub live: bool,
    pub retry: bool,
    pub filter: String,
    pub query_params: SyncQuery,
    /// Caller options forwarded untouched
    pub extra: Map<String, Value>,
}

impl SyncConfig {
    /// Configuration for `collection` under the given options
    pub fn for_collection(
        collection: &str,
        remote: &RemoteTarget,
        direction: SyncDirection,
        options: &ReplicationOptions,
    ) -> Self {
        Self {
            remote: remote.clone(),
            direction,
            live: options.live,
            retry: options.retry,
            filter: FILTER_BY_MODEL_AND_USER_ID.to_string(),
            query_params: SyncQuery {
                model: collection.to_string(),
                user_id: options.user_id.clone(),
            },
            extra: options.extra.clone(),
        }
    }
}

/// A live replication stream between a local collection and the remote
#[async_trait]
pub trait SyncSession: Send + Sync + fmt::Debug {
    /// Name of the replicated collection
    fn collection(&self) -> &str;

    /// Notification channel; changes whenever the session's activity flips
    fn activity(&self) -> watch::Receiver<bool>;

    /// Current push/pull state, if the session exposes one yet
    fn status(&self) -> Option<SyncStatus>;

    /// Stop replicating
    async fn cancel(&self) -> RemoteResult<()>;
}

/// Opens sync sessions; implemented by the document store client
#[async_trait]
pub trait SyncEngine: Send + Sync {
    async fn open(
        &self,
        collection: Arc<Collection>,
        config: SyncConfig,
    ) -> RemoteResult<Arc<dyn SyncSession>>;
}

/// Open one session per collection, in order.
///
/// On failure, sessions opened so far are cancelled before the error is
/// returned so the caller is left with nothing running.
pub async fn open_sessions(
    engine: &dyn SyncEngine,
    collections: &[Arc<Collection>],
    remote: &RemoteTarget,
    direction: SyncDirection,
    options: &ReplicationOptions,
) -> ReplicationResult<Vec<Arc<dyn SyncSession>>> {
    let mut sessions: Vec<Arc<dyn SyncSession>> = Vec::with_capacity(collections.len());

    for collection in collections {
        let config = SyncConfig::for_collection(collection.name(), remote, direction, options);
        match engine.open(Arc::clone(collection), config).await {
            Ok(session) => {
                log_event(Event::SessionOpened, &[("collection", collection.name())]);
                sessions.push(session);
            }
            Err(e) => {
                log_event(
                    Event::SessionOpenFailed,
                    &[("collection", collection.name()), ("reason", &e.to_string())],
                );
                cancel_all(&sessions).await;
                return Err(ReplicationError::session_open(collection.name(), &e));
            }
        }
    }

    Ok(sessions)
}

/// Cancel every session concurrently; failures are logged, not returned.
///
/// Returns the number of sessions that cancelled cleanly.
pub async fn cancel_all(sessions: &[Arc<dyn SyncSession>]) -> usize {
    let results = join_all(sessions.iter().map(|s| s.cancel())).await;

    let mut cancelled = 0;
    for (session, result) in sessions.iter().zip(results) {
        match result {
            Ok(()) => cancelled += 1,
            Err(e) => log_event(
                Event::SessionCancelFailed,
                &[("collection", session.collection()), ("reason", &e.to_string())],
            ),
        }
    }
    cancelled
}
