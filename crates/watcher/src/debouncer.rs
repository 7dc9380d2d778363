//! Restart debouncing
//!
//! Every accepted change pushes the restart deadline out to
//! `last change + delay`. Once the deadline passes with no further change
//! the pending restart is handed out exactly once and the debouncer returns
//! to idle.

use crate::events::ChangeEvent;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Outcome of registering a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// True when this change opened a new settle window, false when it extended one
    pub new_window: bool,
    /// When the restart will fire if nothing else arrives
    pub fires_at: Instant,
}

/// A restart waiting for its settle window to elapse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRestart {
    /// When the first change of this window arrived
    pub first_change: Instant,
    /// When the most recent change arrived
    pub last_change: Instant,
    /// Scheduled fire time
    pub fires_at: Instant,
    /// Distinct paths that changed during the window
    pub paths: BTreeSet<PathBuf>,
    /// Number of registrations folded into this window
    pub event_count: u32,
}

/// Coalesces bursts of accepted changes into a single restart
#[derive(Debug)]
pub struct Debouncer {
    /// Settle period
    delay: Duration,
    /// The open window, if any
    pending: Option<PendingRestart>,
}

impl Debouncer {
    /// Create a new debouncer with the given settle period
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Settle period
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register an accepted change observed at `now`
    pub fn register(&mut self, event: &ChangeEvent, now: Instant) -> Registration {
        self.schedule(Some(event.path.clone()), now)
    }

    /// Open or extend a window without a path, e.g. to restart after a crash
    pub fn trigger(&mut self, now: Instant) -> Registration {
        self.schedule(None, now)
    }

    fn schedule(&mut self, path: Option<PathBuf>, now: Instant) -> Registration {
        let fires_at = now + self.delay;

        match &mut self.pending {
            Some(pending) => {
                // A late-delivered event must never pull the deadline earlier
                pending.last_change = pending.last_change.max(now);
                pending.fires_at = pending.fires_at.max(fires_at);
                pending.event_count += 1;
                pending.paths.extend(path);
                trace!(
                    "Extended restart window ({} events so far)",
                    pending.event_count
                );
                Registration {
                    new_window: false,
                    fires_at: pending.fires_at,
                }
            }
            None => {
                debug!("Opening restart window of {:?}", self.delay);
                self.pending = Some(PendingRestart {
                    first_change: now,
                    last_change: now,
                    fires_at,
                    paths: path.into_iter().collect(),
                    event_count: 1,
                });
                Registration {
                    new_window: true,
                    fires_at,
                }
            }
        }
    }

    /// Check if a restart is waiting
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending restart fires, if one is waiting
    pub fn fires_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.fires_at)
    }

    /// Inspect the pending restart
    pub fn pending(&self) -> Option<&PendingRestart> {
        self.pending.as_ref()
    }

    /// Take the pending restart if its deadline has passed at `now`
    pub fn take_due(&mut self, now: Instant) -> Option<PendingRestart> {
        match &self.pending {
            Some(pending) if pending.fires_at <= now => self.pending.take(),
            _ => None,
        }
    }

    /// Wait for the pending restart to settle and take it
    ///
    /// Returns `None` immediately when nothing is pending. Dropping the
    /// returned future leaves the window untouched, so it can be raced in a
    /// `select!` against new registrations. With a zero delay the window
    /// still settles on the next timer tick rather than synchronously.
    pub async fn settled(&mut self) -> Option<PendingRestart> {
        loop {
            let fires_at = self.fires_at()?;
            sleep_until(fires_at).await;
            if let Some(pending) = self.take_due(Instant::now()) {
                debug!(
                    "Restart window settled after {} events",
                    pending.event_count
                );
                return Some(pending);
            }
        }
    }

    /// Drop any pending restart
    pub fn cancel(&mut self) -> Option<PendingRestart> {
        let cancelled = self.pending.take();
        if cancelled.is_some() {
            debug!("Cancelled pending restart");
        }
        cancelled
    }
}
