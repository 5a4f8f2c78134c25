//! Replication Options
//!
//! - Liveness and retry flags forwarded to every sync session
//! - Owner id used to scope the server-side filter
//! - Explicit environment controlling how recoverable failures are logged
//! - Timer settings for the retry loop and the liveness settle delay
//!
//! Options deserialize from JSON with defaults for every field, so a
//! configuration file may be as small as `{"user_id": "…"}`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ReplicationError, ReplicationResult};
use super::filter::FILTER_VERSION;
use crate::observability::Environment;

/// Interval between filter installation retries
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Delay before reading a session's status after it signals a change
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 50;

/// Options for one replication group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationOptions {
    /// Keep sessions open and stream changes continuously
    pub live: bool,

    /// Let sessions reconnect on their own after network errors
    pub retry: bool,

    /// Owner whose documents are replicated
    pub user_id: Option<String>,

    /// Controls whether recoverable failures are logged
    pub environment: Environment,

    /// Filter installation retry interval, milliseconds
    pub retry_interval_ms: u64,

    /// Liveness settle delay, milliseconds
    pub settle_delay_ms: u64,

    /// Candidate version of the filter design document
    pub filter_version: u64,

    /// Unrecognised keys, forwarded to the sync engine untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self {
            live: true,
            retry: true,
            user_id: None,
            environment: Environment::default(),
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            filter_version: FILTER_VERSION,
            extra: Map::new(),
        }
    }
}

impl ReplicationOptions {
    /// Options scoped to a single user
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Parse options from a JSON string
    pub fn from_json_str(content: &str) -> ReplicationResult<Self> {
        let options: Self = serde_json::from_str(content).map_err(|e| {
            ReplicationError::configuration_error(format!("invalid replication options: {}", e))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file
    pub fn load(path: &Path) -> ReplicationResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReplicationError::configuration_error(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Validate the options.
    ///
    /// - Timers must be non-zero
    /// - A configured user id must be non-empty
    /// - The filter version must be at least 1
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.retry_interval_ms == 0 {
            return Err(ReplicationError::configuration_error(
                "retry_interval_ms must be greater than zero",
            ));
        }
        if self.settle_delay_ms == 0 {
            return Err(ReplicationError::configuration_error(
                "settle_delay_ms must be greater than zero",
            ));
        }
        if self.filter_version == 0 {
            return Err(ReplicationError::configuration_error(
                "filter_version must be at least 1",
            ));
        }
        if matches!(self.user_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(ReplicationError::configuration_error(
                "user_id must not be empty when configured",
            ));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
