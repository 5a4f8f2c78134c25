//! Remote document store seam
//!
//! The store client and its transport live outside this crate. Replication
//! only needs to fetch and write a single design document and to hand the
//! target to the sync engine.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::{RemoteError, RemoteResult};

/// Client for a remote document store
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Fetch a document by id. Missing documents yield `RemoteError::NotFound`.
    async fn get(&self, id: &str) -> RemoteResult<Value>;

    /// Create or overwrite a document. Overwrites must carry the current
    /// `_rev`. Returns the new revision token.
    async fn put(&self, document: Value) -> RemoteResult<String>;

    /// Release the connection
    async fn close(&self) -> RemoteResult<()>;
}

/// Opens ad hoc store connections from a URL
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, url: &str) -> RemoteResult<Arc<dyn DocumentStore>>;
}

/// Where a replication group replicates to
#[derive(Clone)]
pub enum RemoteTarget {
    /// Connection URL; a connection is opened and closed per filter install
    Url(String),
    /// Pre-established live handle, never closed by this crate
    Handle(Arc<dyn DocumentStore>),
}

impl RemoteTarget {
    pub fn url(url: impl Into<String>) -> Self {
        RemoteTarget::Url(url.into())
    }

    pub fn handle(store: Arc<dyn DocumentStore>) -> Self {
        RemoteTarget::Handle(store)
    }

    /// Whether connections for this target are opened ad hoc
    pub fn is_url(&self) -> bool {
        matches!(self, RemoteTarget::Url(_))
    }

    /// Resolve to a usable store handle.
    ///
    /// The returned flag is true when the handle was opened here and must be
    /// closed by the caller.
    pub(crate) async fn open(
        &self,
        connector: Option<&dyn RemoteConnector>,
    ) -> RemoteResult<(Arc<dyn DocumentStore>, bool)> {
        match self {
            RemoteTarget::Handle(store) => Ok((Arc::clone(store), false)),
            RemoteTarget::Url(url) => {
                let connector = connector.ok_or_else(|| {
                    RemoteError::Other(format!("no connector configured for {}", url))
                })?;
                Ok((connector.connect(url).await?, true))
            }
        }
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteTarget::Url(url) => f.debug_tuple("Url").field(url).finish(),
            RemoteTarget::Handle(store) => f.debug_tuple("Handle").field(store).finish(),
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteTarget::Url(url) => write!(f, "{}", url),
            RemoteTarget::Handle(_) => write!(f, "<live handle>"),
        }
    }
}

impl From<&str> for RemoteTarget {
    fn from(url: &str) -> Self {
        RemoteTarget::Url(url.to_string())
    }
}

impl From<Arc<dyn DocumentStore>> for RemoteTarget {
    fn from(store: Arc<dyn DocumentStore>) -> Self {
        RemoteTarget::Handle(store)
    }
}
