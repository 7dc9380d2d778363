#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Change detection for the nodemon-rs supervisor
//!
//! This crate turns raw filesystem notifications into restart decisions:
//! - Conversion of notify events into [`ChangeEvent`] values
//! - Relevance filtering by extension and glob ignore patterns ([`PathFilter`])
//! - Coalescing bursts of accepted changes into one restart ([`Debouncer`])
//! - A recursive notify subscription feeding a tokio channel ([`FileWatcher`])
//!
//! # Example
//!
//! ```no_run
//! use nodemon_core::WatchConfig;
//! use nodemon_watcher::{Debouncer, FileWatcher, PathFilter, WatcherConfig};
//! use tokio::time::Instant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatchConfig::new("/srv/app/server.js");
//! let filter = PathFilter::new(&config)?;
//! let mut debouncer = Debouncer::new(config.restart_delay());
//!
//! let mut watcher = FileWatcher::new(WatcherConfig::default());
//! let mut events = watcher.watch(&config.watch_root)?;
//!
//! while let Some(event) = events.recv().await {
//!     if filter.accept(&event) {
//!         debouncer.register(&event, Instant::now());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod config;
mod debouncer;
mod events;
mod filter;
mod watcher;

// Public exports - minimal API surface
pub use config::WatcherConfig;
pub use debouncer::{Debouncer, PendingRestart, Registration};
pub use events::{ChangeEvent, ChangeKind};
pub use filter::PathFilter;
pub use watcher::FileWatcher;
