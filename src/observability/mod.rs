//! Observability for replication groups and collection hooks
//!
//! This module provides:
//! - Structured logging (JSON lines)
//! - Per-group counters
//! - Explicit environment-driven verbosity
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Logging never fails the caller
//! 3. Verbosity is configured, never read from process state
//!
//! # Usage
//!
//! ```ignore
//! use aerodb_sync::observability::{log_event, Environment, Event};
//!
//! log_event(Event::ConnectBegin, &[("group", "…")]);
//! log_recoverable(Environment::Production, Event::FilterInstallFailed, &[]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, ReplicationMetrics};

use serde::{Deserialize, Serialize};

/// Deployment environment controlling how recoverable errors are reported.
///
/// Development surfaces recoverable failures at ERROR level; production
/// keeps them out of the logs entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether recoverable errors should be written to the log
    pub fn surfaces_recoverable_errors(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Log a lifecycle event with fields.
///
/// Failure events are written at ERROR, everything else at INFO.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a recoverable failure, honouring the configured environment.
pub fn log_recoverable(environment: Environment, event: Event, fields: &[(&str, &str)]) {
    if environment.surfaces_recoverable_errors() {
        Logger::error(event.as_str(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_environment_is_development() {
        assert_eq!(Environment::default(), Environment::Development);
        assert!(Environment::Development.surfaces_recoverable_errors());
        assert!(!Environment::Production.surfaces_recoverable_errors());
    }

    #[test]
    fn test_environment_deserializes_lowercase() {
        let env: Environment = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(env, Environment::Production);
    }

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::ConnectBegin, &[("group", "test")]);
        log_recoverable(Environment::Production, Event::FilterInstallFailed, &[]);
        log_recoverable(Environment::Development, Event::FilterInstallFailed, &[]);
    }
}
