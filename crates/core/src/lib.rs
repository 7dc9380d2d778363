#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Core types for the nodemon-rs process supervisor
//!
//! This crate provides the foundational pieces shared by the watcher,
//! the supervisor engine and the command-line front end:
//!
//! - **Configuration**: layered resolution of defaults, `nodemon.json`,
//!   environment variables and command-line flags into one immutable
//!   [`WatchConfig`]
//! - **Error handling**: the unified [`Error`] taxonomy
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{ExtList, WatchConfig, WatchOptions};
pub use error::{Error, Result, ResultExt};
