//! # Liveness Aggregation
//!
//! Folds the push/pull state of every session in a group into one boolean.
//!
//! Each session gets a watcher task. On start and on every activity change
//! the watcher waits for the settle delay, reads the session status, and
//! updates its flag. The group signal is true iff there is at least one flag
//! and all flags are true, and it is only republished when it changes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::session::SyncSession;
use crate::observability::{log_event, Event};

/// True iff `flags` is non-empty and every flag is set
pub fn aggregate(flags: &[bool]) -> bool {
    !flags.is_empty() && flags.iter().all(|live| *live)
}

type Flags = Arc<Mutex<Vec<bool>>>;

/// Watchers for one set of sessions.
///
/// Dropping the aggregator (or calling [`shutdown`](Self::shutdown)) stops
/// every watcher, clears the flags and forces the signal to false.
#[derive(Debug)]
pub struct LivenessAggregator {
    flags: Flags,
    signal: Arc<watch::Sender<bool>>,
    watchers: Vec<JoinHandle<()>>,
}

impl LivenessAggregator {
    /// Start one watcher per session, publishing into `signal`
    pub fn spawn(
        sessions: &[Arc<dyn SyncSession>],
        settle_delay: Duration,
        signal: Arc<watch::Sender<bool>>,
    ) -> Self {
        let flags: Flags = Arc::new(Mutex::new(vec![false; sessions.len()]));

        let watchers = sessions
            .iter()
            .enumerate()
            .map(|(index, session)| {
                tokio::spawn(watch_session(
                    index,
                    Arc::clone(session),
                    settle_delay,
                    Arc::clone(&flags),
                    Arc::clone(&signal),
                ))
            })
            .collect();

        Self {
            flags,
            signal,
            watchers,
        }
    }

    /// Current flags, index-aligned with the sessions
    pub fn flags(&self) -> Vec<bool> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop all watchers and reset the signal
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for LivenessAggregator {
    fn drop(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }

        // A watcher still running on another worker finds the flags empty and
        // can only ever publish false.
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.clear();
        publish(&self.signal, aggregate(&flags));
    }
}

async fn watch_session(
    index: usize,
    session: Arc<dyn SyncSession>,
    settle_delay: Duration,
    flags: Flags,
    signal: Arc<watch::Sender<bool>>,
) {
    let mut activity = session.activity();

    loop {
        tokio::time::sleep(settle_delay).await;

        let live = session.status().map(|status| status.is_live()).unwrap_or(false);
        {
            let mut flags = flags.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(flag) = flags.get_mut(index) {
                *flag = live;
            }
            // Published under the lock so teardown cannot be overtaken
            publish(&signal, aggregate(&flags));
        }

        if activity.changed().await.is_err() {
            // Session dropped its notifier; nothing more will change
            break;
        }
    }
}

/// Publish `value` only if it differs from the current signal
fn publish(signal: &watch::Sender<bool>, value: bool) {
    let changed = signal.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });

    if changed {
        log_event(Event::ActivityChanged, &[("active", if value { "true" } else { "false" })]);
    }
}
