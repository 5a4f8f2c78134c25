//! Filtered Replication
//!
//! Turns a set of named collections plus a remote endpoint into a
//! supervised, filtered, bidirectional sync group with a single activity
//! signal.
//!
//! - A versioned design document on the remote carries the filters
//! - One sync session per collection, scoped by model name and user id
//! - Session push/pull states fold into one debounced boolean
//! - Filter installation failures are retried on a fixed interval;
//!   session failures are returned to the caller
//!
//! The remote store client, its connector and the sync engine are traits;
//! [`memory`] provides process-local implementations.

mod config;
mod errors;
mod filter;
mod group;
mod liveness;
pub mod memory;
mod registry;
mod remote;
mod session;

pub use config::{ReplicationOptions, DEFAULT_RETRY_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS};
pub use errors::{
    RemoteError, RemoteResult, ReplicationError, ReplicationErrorKind, ReplicationResult,
};
pub use filter::{
    FilterClause, FilterDocument, FilterInstaller, FilterOp, FilterRule, InstallOutcome,
    DESIGN_DOC_ID, FILTER_BY_MODEL, FILTER_BY_MODEL_AND_USER_ID, FILTER_VERSION, MODEL_FIELD,
    MODEL_PARAM, OWNER_FIELD, USER_ID_PARAM,
};
pub use group::{GroupState, ReplicationBackend, ReplicationGroup};
pub use liveness::{aggregate, LivenessAggregator};
pub use registry::ReplicationRegistry;
pub use remote::{DocumentStore, RemoteConnector, RemoteTarget};
pub use session::{
    cancel_all, open_sessions, StreamState, SyncConfig, SyncDirection, SyncEngine, SyncQuery,
    SyncSession, SyncStatus,
};
