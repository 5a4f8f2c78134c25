//! aerodb-sync - Filtered, supervised replication for local collections
//!
//! A local [`Database`] owns schema-checked collections. Each collection
//! carries a model tag and an owner id, so a single remote store can hold
//! every collection of every user and still be replicated per model and per
//! user.
//!
//! [`Database::replicate`] installs a versioned filter document on the
//! remote, opens one filtered sync session per collection, and reports the
//! health of all of them as one boolean signal.

pub mod database;
pub mod observability;
pub mod replication;
pub mod schema;

pub use database::{
    Collection, CollectionHook, Database, DatabaseBuilder, DatabaseError, DatabaseResult,
    ReplicationFields, Timestamps,
};
pub use replication::{
    GroupState, RemoteTarget, ReplicationBackend, ReplicationError, ReplicationGroup,
    ReplicationOptions, ReplicationResult, SyncDirection,
};
