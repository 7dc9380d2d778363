//! Child process lifecycle
//!
//! [`ChildProcessController`] owns at most one live child. Each child gets a
//! monitor task at spawn time that reaps it and reports the exit both to the
//! controller (for [`ChildProcessController::stop`]) and on the exit channel
//! handed out by [`ChildProcessController::new`] (for crash detection).

use nodemon_core::{Error, Result, WatchConfig};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Time a child gets to exit after the graceful termination signal
pub const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_secs(3);

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Exited with a status code
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
    /// The exit status could not be collected
    Unknown,
}

impl ExitReason {
    /// True only for exit code zero
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl From<ExitStatus> for ExitReason {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }

        Self::Unknown
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(signal) => write!(f, "signal {signal}"),
            Self::Unknown => write!(f, "unknown status"),
        }
    }
}

/// Exit notification for one child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: u32,
    /// Spawn counter of the child, unique per controller even if the OS reuses pids
    pub generation: u64,
    pub reason: ExitReason,
}

/// Lifecycle of the controller's child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    NotStarted,
    Running { pid: u32, started_at: Instant },
    Stopping { pid: u32, deadline: Instant },
    Exited { pid: u32, reason: ExitReason },
}

/// Identifies a spawned child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildHandle {
    pub pid: u32,
    pub generation: u64,
    pub started_at: Instant,
}

/// Bookkeeping for the child currently owned by the controller
struct LiveChild {
    handle: ChildHandle,
    /// Set once by the monitor task when the child has been reaped
    exit_rx: watch::Receiver<Option<ChildExit>>,
    /// Asks the monitor to force-kill; dropping it has the same effect
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Spawns, stops and observes a single child process
pub struct ChildProcessController {
    state: ChildState,
    live: Option<LiveChild>,
    grace_timeout: Duration,
    /// Number of children spawned so far
    spawned: u64,
    exit_tx: mpsc::UnboundedSender<ChildExit>,
}

impl ChildProcessController {
    /// Create a controller and the channel on which child exits are reported
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChildExit>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let controller = Self {
            state: ChildState::NotStarted,
            live: None,
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
            spawned: 0,
            exit_tx,
        };
        (controller, exit_rx)
    }

    /// Override the graceful termination timeout
    pub fn with_grace_timeout(mut self, grace_timeout: Duration) -> Self {
        self.grace_timeout = grace_timeout;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChildState {
        self.state
    }

    /// Handle of the child that is currently owned, if any
    pub fn handle(&self) -> Option<ChildHandle> {
        self.live.as_ref().map(|live| live.handle)
    }

    /// Check whether the owned child is alive
    pub fn is_running(&self) -> bool {
        let reaped = self
            .live
            .as_ref()
            .map(|live| live.exit_rx.borrow().is_some())
            .unwrap_or(true);
        matches!(self.state, ChildState::Running { .. }) && !reaped
    }

    /// Spawn the executor with the script as its last argument
    ///
    /// Standard streams are inherited so the child's output is visible live.
    /// On Unix the child leads its own process group, so stopping it also
    /// reaches anything it started. Must be called within a Tokio runtime.
    pub fn start(&mut self, config: &WatchConfig) -> Result<ChildHandle> {
        if let ChildState::Running { pid, .. } | ChildState::Stopping { pid, .. } = self.state {
            return Err(Error::process(format!(
                "Child {pid} is still alive; stop it before starting another"
            )));
        }

        let (program, args) = config
            .executor_command()
            .ok_or_else(|| Error::config("Executor must not be empty"))?;

        let resolved = which::which(program).map_err(|e| {
            Error::spawn(
                program,
                std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
            )
        })?;

        let mut cmd = Command::new(&resolved);
        cmd.args(&args)
            .arg(&config.script_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                // Own process group so termination reaches every descendant
                libc::setpgid(0, 0);
                // Request SIGTERM if the supervisor dies without cleaning up (Linux-only)
                #[cfg(target_os = "linux")]
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|e| Error::spawn(&config.executor, e))?;
        let pid = child
            .id()
            .ok_or_else(|| Error::process("Spawned child exited before its pid was read"))?;

        self.spawned += 1;
        let generation = self.spawned;

        let (status_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(monitor_child(
            child,
            pid,
            generation,
            kill_rx,
            status_tx,
            self.exit_tx.clone(),
        ));

        let handle = ChildHandle {
            pid,
            generation,
            started_at: Instant::now(),
        };
        info!(
            "Started `{} {}` (pid {})",
            config.executor,
            config.script_path.display(),
            pid
        );

        self.state = ChildState::Running {
            pid,
            started_at: handle.started_at,
        };
        self.live = Some(LiveChild {
            handle,
            exit_rx,
            kill_tx: Some(kill_tx),
        });

        Ok(handle)
    }

    /// Stop the child using the configured grace timeout
    pub async fn stop(&mut self) -> Result<Option<ChildExit>> {
        self.stop_with_timeout(self.grace_timeout).await
    }

    /// Gracefully stop the child, force-killing it after `grace`
    ///
    /// Returns only once the child has been reaped. Returns `Ok(None)` when
    /// there is no child to stop, so repeated calls never signal twice.
    pub async fn stop_with_timeout(&mut self, grace: Duration) -> Result<Option<ChildExit>> {
        let Some(mut live) = self.live.take() else {
            return Ok(None);
        };
        let pid = live.handle.pid;

        let already_exited = *live.exit_rx.borrow();
        if let Some(exit) = already_exited {
            debug!("Child {} already exited ({})", pid, exit.reason);
            self.state = ChildState::Exited {
                pid,
                reason: exit.reason,
            };
            return Ok(Some(exit));
        }

        self.state = ChildState::Stopping {
            pid,
            deadline: Instant::now() + grace,
        };
        debug!("Sending termination signal to child {}", pid);
        request_termination(&mut live);

        let graceful = timeout(grace, wait_for_exit(&mut live.exit_rx)).await;
        let exit = match graceful {
            Ok(exit) => exit,
            Err(_) => {
                warn!("Child {} didn't stop gracefully, force killing", pid);
                if let Some(kill_tx) = live.kill_tx.take() {
                    let _ = kill_tx.send(());
                }
                wait_for_exit(&mut live.exit_rx).await
            }
        }?;

        // Processes that outlived the leader are still in its group
        #[cfg(unix)]
        if signal_group(pid, libc::SIGKILL) {
            debug!("Killed leftover processes in group {}", pid);
        }

        info!("Child {} stopped ({})", pid, exit.reason);
        self.state = ChildState::Exited {
            pid,
            reason: exit.reason,
        };
        Ok(Some(exit))
    }

    /// Record an exit reported on the exit channel
    ///
    /// Returns `true` when the exit belongs to the running child, i.e. it
    /// died on its own. Exits of children that were stopped deliberately
    /// return `false`, including a stale exit whose pid the OS has since
    /// handed to the current child.
    pub fn observe_exit(&mut self, exit: ChildExit) -> bool {
        let is_current = matches!(self.state, ChildState::Running { .. })
            && self
                .live
                .as_ref()
                .is_some_and(|live| live.handle.generation == exit.generation);
        if !is_current {
            return false;
        }

        self.state = ChildState::Exited {
            pid: exit.pid,
            reason: exit.reason,
        };
        self.live = None;
        true
    }
}

#[cfg(unix)]
fn request_termination(live: &mut LiveChild) {
    let pid = live.handle.pid;
    if !signal_group(pid, libc::SIGTERM) {
        debug!(
            "SIGTERM to group {} failed: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
    // Members stopped by job control only act on SIGTERM once continued
    signal_group(pid, libc::SIGCONT);
}

/// Signal the process group led by `pid`; `false` when nothing received it
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    // SAFETY: the child called setpgid(0, 0), so its pid is the group id
    unsafe { libc::killpg(pid as libc::pid_t, signal) == 0 }
}

#[cfg(not(unix))]
fn request_termination(live: &mut LiveChild) {
    // No polite signal available; termination is immediate
    if let Some(kill_tx) = live.kill_tx.take() {
        let _ = kill_tx.send(());
    }
}

async fn wait_for_exit(exit_rx: &mut watch::Receiver<Option<ChildExit>>) -> Result<ChildExit> {
    let exit = exit_rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| Error::process("Child monitor ended without reporting an exit"))?;
    (*exit).ok_or_else(|| Error::process("Child monitor reported an empty exit"))
}

/// Reap the child, force-killing it when asked or when the controller lets go
async fn monitor_child(
    mut child: Child,
    pid: u32,
    generation: u64,
    mut kill_rx: oneshot::Receiver<()>,
    status_tx: watch::Sender<Option<ChildExit>>,
    exit_tx: mpsc::UnboundedSender<ChildExit>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            #[cfg(unix)]
            signal_group(pid, libc::SIGKILL);
            if let Err(e) = child.start_kill() {
                debug!("Failed to kill child {}: {}", pid, e);
            }
            child.wait().await
        }
    };

    let reason = match status {
        Ok(status) => ExitReason::from(status),
        Err(e) => {
            warn!("Failed to collect exit status of child {}: {}", pid, e);
            ExitReason::Unknown
        }
    };

    let exit = ChildExit {
        pid,
        generation,
        reason,
    };
    let _ = status_tx.send(Some(exit));
    let _ = exit_tx.send(exit);
}
