//! Replication Error Types
//!
//! - Configuration errors are raised synchronously and are fatal
//! - Filter installation failures are recoverable (retry loop)
//! - Session failures propagate to the caller of `connect()`

use std::fmt;

use thiserror::Error;

/// Replication error type
#[derive(Debug, Clone)]
pub struct ReplicationError {
    /// Error kind
    pub kind: ReplicationErrorKind,
    /// Error message
    pub message: String,
}

/// Replication error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationErrorKind {
    /// Invalid options or unknown collection
    ConfigurationError,

    /// Filter document could not be installed
    FilterInstall,

    /// A sync session could not be opened
    SessionOpen,

    /// The group was destroyed and cannot be reused
    Destroyed,
}

impl ReplicationError {
    /// Create a new replication error.
    pub fn new(kind: ReplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::ConfigurationError, message)
    }

    /// Create a filter installation error.
    pub fn filter_install(source: &RemoteError) -> Self {
        Self::new(
            ReplicationErrorKind::FilterInstall,
            format!("filter installation failed: {}", source),
        )
    }

    /// Create a session open error.
    pub fn session_open(collection: &str, source: &RemoteError) -> Self {
        Self::new(
            ReplicationErrorKind::SessionOpen,
            format!("sync session for '{}' failed to open: {}", collection, source),
        )
    }

    /// Create a destroyed-group error.
    pub fn destroyed() -> Self {
        Self::new(
            ReplicationErrorKind::Destroyed,
            "replication group has been destroyed",
        )
    }

    /// Check if this error can never be resolved by calling `connect()` again.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ReplicationErrorKind::ConfigurationError | ReplicationErrorKind::Destroyed
        )
    }
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicationError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ReplicationError {}

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors reported by remote store and sync engine collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// Write rejected because the revision token is stale
    #[error("revision conflict on {0}")]
    Conflict(String),

    /// Remote could not be reached
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Handle was already closed
    #[error("connection closed")]
    Closed,

    /// Any other transport or protocol failure
    #[error("remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Whether this is a not-found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Result type for collaborator calls
pub type RemoteResult<T> = Result<T, RemoteError>;
