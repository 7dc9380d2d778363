//! Restart orchestration
//!
//! The engine funnels three concurrent sources into one serialized loop:
//! filesystem changes, child exits and the debounce deadline. A shutdown
//! request is a cancellation token checked by the loop and between the stop
//! and start halves of a restart, so a restart in progress never leaves a
//! child without an owner.

use crate::process::{ChildExit, ChildProcessController, ExitReason, DEFAULT_GRACE_TIMEOUT};
use nodemon_core::{Error, Result, WatchConfig};
use nodemon_watcher::{ChangeEvent, Debouncer, FileWatcher, PathFilter, PendingRestart, WatcherConfig};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the engine event stream
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No child is running; waiting for a change
    Idle,
    /// Child alive, no restart scheduled
    Running,
    /// A restart is waiting for changes to settle
    PendingRestart,
    /// Stop-then-start in progress
    Restarting,
    /// Tearing down the child and the subscription
    ShuttingDown,
    /// Terminal
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PendingRestart => "pending restart",
            Self::Restarting => "restarting",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshot of the engine published on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Pid of the live child, if any
    pub child_pid: Option<u32>,
    /// Completed restarts, not counting the initial start
    pub restarts: u64,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            child_pid: None,
            restarts: 0,
        }
    }
}

/// Observable lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The initial child is running
    Started { pid: u32 },
    /// A settled batch of changes is restarting the child
    Restarting { paths: Vec<PathBuf> },
    /// A replacement child is running
    Restarted { pid: u32 },
    /// The executor could not be launched; the engine is idle until the next change
    SpawnFailed { message: String },
    /// The child exited on its own
    ChildExited {
        pid: u32,
        reason: ExitReason,
        crashed: bool,
    },
    ShuttingDown,
    Stopped,
}

/// Builder and entry point for a supervised watch session
pub struct WatchEngine {
    config: WatchConfig,
    grace_timeout: Duration,
    watcher_config: WatcherConfig,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl WatchEngine {
    pub fn new(config: WatchConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
            watcher_config: WatcherConfig::default(),
            events_tx,
        }
    }

    /// Override how long a child gets to exit before it is force-killed
    pub fn with_grace_timeout(mut self, grace_timeout: Duration) -> Self {
        self.grace_timeout = grace_timeout;
        self
    }

    /// Override the filesystem subscription settings
    pub fn with_watcher_config(mut self, watcher_config: WatcherConfig) -> Self {
        self.watcher_config = watcher_config;
        self
    }

    /// Subscribe to engine events before spawning, so `Started` is observed
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// The configuration this engine supervises
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Watch the configured root and start the child
    ///
    /// Startup failures (invalid pattern, unwatchable root, executor that
    /// cannot be launched) are returned here and nothing keeps running.
    /// Must be called within a Tokio runtime.
    pub fn spawn(self) -> Result<EngineHandle> {
        let mut watcher = FileWatcher::new(self.watcher_config.clone());
        let changes = watcher.watch(&self.config.watch_root)?;
        self.launch(changes, Some(watcher))
    }

    /// Start the child and drive restarts from an external change source
    pub fn spawn_with_source(self, changes: mpsc::Receiver<ChangeEvent>) -> Result<EngineHandle> {
        self.launch(changes, None)
    }

    fn launch(
        self,
        changes: mpsc::Receiver<ChangeEvent>,
        watcher: Option<FileWatcher>,
    ) -> Result<EngineHandle> {
        let filter = PathFilter::new(&self.config)?;
        let (controller, exits) = ChildProcessController::new();
        let mut controller = controller.with_grace_timeout(self.grace_timeout);

        let handle = controller.start(&self.config)?;
        let _ = self.events_tx.send(EngineEvent::Started { pid: handle.pid });

        let (status_tx, status_rx) = watch::channel(EngineStatus {
            state: EngineState::Running,
            child_pid: Some(handle.pid),
            restarts: 0,
        });
        let shutdown = CancellationToken::new();

        let runner = EngineLoop {
            debouncer: Debouncer::new(self.config.restart_delay()),
            config: self.config,
            filter,
            controller,
            watcher,
            shutdown: shutdown.clone(),
            status_tx,
            events_tx: self.events_tx.clone(),
        };
        let task = tokio::spawn(runner.run(changes, exits));

        Ok(EngineHandle {
            shutdown,
            task: Some(task),
            status_rx,
            events_tx: self.events_tx,
        })
    }
}

/// Control surface for a running engine
///
/// Dropping the handle requests shutdown without waiting for it.
pub struct EngineHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
    status_rx: watch::Receiver<EngineStatus>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Stop the child, release the subscription and wait for the engine to finish
    ///
    /// Calling it again is a no-op.
    pub async fn kill(&mut self) -> Result<()> {
        self.shutdown.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await
            .map_err(|e| Error::process(format!("Engine task failed: {e}")))
    }

    /// Latest engine status
    pub fn status(&self) -> EngineStatus {
        *self.status_rx.borrow()
    }

    /// Receiver notified on every status change
    pub fn status_receiver(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to engine events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Check if the engine loop has ended
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// State owned by the engine task
struct EngineLoop {
    config: WatchConfig,
    filter: PathFilter,
    debouncer: Debouncer,
    controller: ChildProcessController,
    watcher: Option<FileWatcher>,
    shutdown: CancellationToken,
    status_tx: watch::Sender<EngineStatus>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut changes: mpsc::Receiver<ChangeEvent>,
        mut exits: mpsc::UnboundedReceiver<ChildExit>,
    ) {
        let shutdown = self.shutdown.clone();
        let mut changes_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(exit) = exits.recv() => self.on_exit(exit),

                change = changes.recv(), if changes_open => match change {
                    Some(event) => self.on_change(event),
                    None => {
                        warn!("Change source closed; no further restarts will be triggered");
                        changes_open = false;
                    }
                },

                Some(pending) = self.debouncer.settled() => self.restart(pending).await,
            }
        }

        self.shutdown_now().await;
    }

    fn on_change(&mut self, event: ChangeEvent) {
        if !self.filter.accept(&event) {
            return;
        }

        let registration = self.debouncer.register(&event, Instant::now());
        if registration.new_window {
            debug!("Change to {:?} scheduled a restart", event.path);
            self.set_state(EngineState::PendingRestart);
        }
    }

    fn on_exit(&mut self, exit: ChildExit) {
        if !self.controller.observe_exit(exit) {
            debug!("Ignoring exit of stopped child {}", exit.pid);
            return;
        }

        let crashed = !exit.reason.is_success();
        if crashed {
            warn!("Child {} crashed ({})", exit.pid, exit.reason);
        } else {
            info!("Child {} exited cleanly", exit.pid);
        }
        let _ = self.events_tx.send(EngineEvent::ChildExited {
            pid: exit.pid,
            reason: exit.reason,
            crashed,
        });

        if crashed && self.config.restart_on_crash {
            self.debouncer.trigger(Instant::now());
            self.set_state(EngineState::PendingRestart);
        } else if !self.debouncer.is_pending() {
            self.set_state(EngineState::Idle);
        } else {
            self.publish_child();
        }
    }

    async fn restart(&mut self, pending: PendingRestart) {
        if self.shutdown.is_cancelled() {
            return;
        }

        info!(
            "Restarting after {} change(s) to {} path(s)",
            pending.event_count,
            pending.paths.len()
        );
        self.set_state(EngineState::Restarting);
        let _ = self.events_tx.send(EngineEvent::Restarting {
            paths: pending.paths.into_iter().collect(),
        });

        if let Err(e) = self.controller.stop().await {
            warn!("Failed to stop child cleanly: {}", e);
        }

        if self.shutdown.is_cancelled() {
            debug!("Shutdown requested during restart; not starting a new child");
            return;
        }

        match self.controller.start(&self.config) {
            Ok(handle) => {
                self.status_tx.send_modify(|status| status.restarts += 1);
                let _ = self
                    .events_tx
                    .send(EngineEvent::Restarted { pid: handle.pid });
                self.set_state(EngineState::Running);
            }
            Err(e) => {
                error!("Restart failed: {}", e);
                let _ = self.events_tx.send(EngineEvent::SpawnFailed {
                    message: e.to_string(),
                });
                self.set_state(EngineState::Idle);
            }
        }
    }

    async fn shutdown_now(&mut self) {
        info!("Shutting down watch engine");
        self.set_state(EngineState::ShuttingDown);
        let _ = self.events_tx.send(EngineEvent::ShuttingDown);

        self.debouncer.cancel();
        if let Err(e) = self.controller.stop().await {
            warn!("Failed to stop child during shutdown: {}", e);
        }
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }

        self.set_state(EngineState::Stopped);
        let _ = self.events_tx.send(EngineEvent::Stopped);
    }

    fn set_state(&self, state: EngineState) {
        let child_pid = self.live_pid();
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.child_pid = child_pid;
        });
    }

    fn publish_child(&self) {
        let child_pid = self.live_pid();
        self.status_tx
            .send_modify(|status| status.child_pid = child_pid);
    }

    fn live_pid(&self) -> Option<u32> {
        self.controller.handle().map(|handle| handle.pid)
    }
}
