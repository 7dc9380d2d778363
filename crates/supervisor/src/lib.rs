#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Child supervision for nodemon-rs
//!
//! [`ChildProcessController`] owns the single child process and its
//! graceful-then-forced termination. [`WatchEngine`] wires the controller to
//! the change stream from `nodemon-watcher` and restarts the child once
//! accepted changes have settled.
//!
//! # Example
//!
//! ```no_run
//! use nodemon_core::WatchConfig;
//!
//! # async fn example() -> nodemon_core::Result<()> {
//! let config = WatchConfig::builder("server.js").restart_delay_secs(0.5).build()?;
//! let mut engine = nodemon_supervisor::watch(config)?;
//!
//! tokio::signal::ctrl_c().await?;
//! engine.kill().await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod process;

pub use engine::{EngineEvent, EngineHandle, EngineState, EngineStatus, WatchEngine};
pub use process::{
    ChildExit, ChildHandle, ChildProcessController, ChildState, ExitReason, DEFAULT_GRACE_TIMEOUT,
};

use nodemon_core::{Result, WatchConfig};

/// Watch the configured root and keep the script running
///
/// Returns once the initial child has started. Must be called within a
/// Tokio runtime.
pub fn watch(config: WatchConfig) -> Result<EngineHandle> {
    WatchEngine::new(config).spawn()
}
