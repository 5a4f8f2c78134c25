//! Observable replication events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events emitted by replication groups and collection hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Group lifecycle
    /// `connect()` invoked
    ConnectBegin,
    /// Group reached the Active state
    ConnectComplete,
    /// `close()` invoked
    CloseBegin,
    /// Teardown finished
    CloseComplete,
    /// Group removed from its registry
    Destroyed,

    // Filter document
    /// Filter installation attempt started
    FilterInstallBegin,
    /// Filter document created or updated
    FilterInstallComplete,
    /// Stored filter document is current, nothing written
    FilterInstallUnchanged,
    /// Filter installation attempt failed
    FilterInstallFailed,

    // Retry loop
    /// Retry polling started
    RetryScheduled,
    /// A retry attempt fired
    RetryAttempt,
    /// Retry loop recovered and sessions are open
    RetryRecovered,
    /// Sessions could not be opened after the filter was installed
    RetrySessionOpenFailed,

    // Sync sessions
    /// Sync session opened for a collection
    SessionOpened,
    /// Sync session failed to open
    SessionOpenFailed,
    /// Sync session cancellation failed
    SessionCancelFailed,

    // Activity signal
    /// Aggregate activity signal changed
    ActivityChanged,

    // Collections
    /// Collection definition accepted
    CollectionCreated,
    /// Collection definition rejected by a hook
    CollectionRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConnectBegin => "REPLICATION_CONNECT_BEGIN",
            Event::ConnectComplete => "REPLICATION_CONNECT_COMPLETE",
            Event::CloseBegin => "REPLICATION_CLOSE_BEGIN",
            Event::CloseComplete => "REPLICATION_CLOSE_COMPLETE",
            Event::Destroyed => "REPLICATION_DESTROYED",

            Event::FilterInstallBegin => "FILTER_INSTALL_BEGIN",
            Event::FilterInstallComplete => "FILTER_INSTALL_COMPLETE",
            Event::FilterInstallUnchanged => "FILTER_INSTALL_UNCHANGED",
            Event::FilterInstallFailed => "FILTER_INSTALL_FAILED",

            Event::RetryScheduled => "REPLICATION_RETRY_SCHEDULED",
            Event::RetryAttempt => "REPLICATION_RETRY_ATTEMPT",
            Event::RetryRecovered => "REPLICATION_RETRY_RECOVERED",
            Event::RetrySessionOpenFailed => "REPLICATION_RETRY_SESSION_OPEN_FAILED",

            Event::SessionOpened => "SYNC_SESSION_OPENED",
            Event::SessionOpenFailed => "SYNC_SESSION_OPEN_FAILED",
            Event::SessionCancelFailed => "SYNC_SESSION_CANCEL_FAILED",

            Event::ActivityChanged => "REPLICATION_ACTIVITY_CHANGED",

            Event::CollectionCreated => "COLLECTION_CREATED",
            Event::CollectionRejected => "COLLECTION_REJECTED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::FilterInstallFailed
                | Event::RetrySessionOpenFailed
                | Event::SessionOpenFailed
                | Event::SessionCancelFailed
                | Event::CollectionRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
