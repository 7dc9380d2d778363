//! Configuration module for nodemon-rs
//!
//! [`WatchConfig`] is the single immutable value the supervisor runs from.
//! It is produced either programmatically (via [`WatchConfig::new`] and the
//! builder) or by [`ConfigLoader`], which merges built-in defaults,
//! `nodemon.json`, `NODEMON_*` environment variables and command-line flags.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use defaults::{CONFIG_FILE_NAME, ENV_PREFIX, PACKAGE_MANIFEST_NAME};
pub use loading::ConfigLoader;

use defaults::*;

/// Immutable configuration for one supervised script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchConfig {
    /// Absolute path of the script handed to the executor
    pub script_path: PathBuf,
    /// Lowercase extensions without leading dot that trigger a restart
    pub extensions: BTreeSet<String>,
    /// Glob patterns, relative to `watch_root`, whose matches never trigger a restart
    pub ignore_patterns: Vec<String>,
    /// Command used to run the script; may carry leading arguments (`node --inspect`)
    pub executor: String,
    /// Settle period after the last accepted change, in seconds
    pub restart_delay_secs: f64,
    /// Directory watched recursively
    pub watch_root: PathBuf,
    /// Restart the child when it exits on its own with a failure status
    pub restart_on_crash: bool,
}

impl WatchConfig {
    /// Create a configuration for `script_path` with every other field defaulted
    ///
    /// A relative script path is made absolute against the current
    /// directory. The watch root defaults to the directory containing the
    /// script.
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        let script_path = absolute_path(script_path.into());
        let watch_root = script_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| absolute_path(PathBuf::from(DEFAULT_WATCH_ROOT)));

        Self {
            script_path,
            extensions: default_extensions(),
            ignore_patterns: default_ignore_patterns(),
            executor: DEFAULT_EXECUTOR.to_string(),
            restart_delay_secs: DEFAULT_DELAY_SECS,
            watch_root,
            restart_on_crash: false,
        }
    }

    /// Create configuration from builder
    pub fn builder(script_path: impl Into<PathBuf>) -> WatchConfigBuilder {
        WatchConfigBuilder {
            config: Self::new(script_path),
        }
    }

    /// Get the debounce duration
    pub fn restart_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.restart_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Split the executor into the program and its leading arguments
    ///
    /// Returns `None` when the executor is blank.
    pub fn executor_command(&self) -> Option<(&str, Vec<&str>)> {
        let mut parts = self.executor.split_whitespace();
        let program = parts.next()?;
        Some((program, parts.collect()))
    }

    /// Extensions joined the way they are written on the command line
    pub fn extensions_display(&self) -> String {
        self.extensions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.script_path.as_os_str().is_empty() {
            return Err(Error::config("No script specified to run"));
        }

        if !self.script_path.is_absolute() {
            return Err(Error::config(format!(
                "Script path must be absolute: {}",
                self.script_path.display()
            )));
        }

        if self.executor_command().is_none() {
            return Err(Error::config("Executor must not be empty"));
        }

        if !self.restart_delay_secs.is_finite() || self.restart_delay_secs < 0.0 {
            return Err(Error::config(format!(
                "Invalid delay {}: must be a non-negative number of seconds",
                self.restart_delay_secs
            )));
        }

        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config(format!("Invalid ignore pattern '{pattern}': {e}"))
            })?;
        }

        Ok(())
    }
}

/// Resolve against the current directory, leaving the path as is when that fails
///
/// Event paths from the watcher are absolute, so relative script or root
/// paths would never compare equal to them.
fn absolute_path(path: PathBuf) -> PathBuf {
    match std::path::absolute(&path) {
        Ok(absolute) => absolute.components().collect(),
        Err(_) => path,
    }
}

/// Builder for WatchConfig
#[derive(Debug)]
pub struct WatchConfigBuilder {
    config: WatchConfig,
}

impl WatchConfigBuilder {
    /// Set the watched extensions
    pub fn extensions(mut self, extensions: ExtList) -> Self {
        self.config.extensions = extensions.normalize();
        self
    }

    /// Set ignore patterns
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Add an ignore pattern
    pub fn add_ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore_patterns.push(pattern.into());
        self
    }

    /// Set the executor command
    pub fn executor(mut self, executor: impl Into<String>) -> Self {
        self.config.executor = executor.into();
        self
    }

    /// Set the settle period in seconds
    pub fn restart_delay_secs(mut self, secs: f64) -> Self {
        self.config.restart_delay_secs = secs;
        self
    }

    /// Set the watched directory
    pub fn watch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.watch_root = absolute_path(root.into());
        self
    }

    /// Restart on non-zero exits as well as on file changes
    pub fn restart_on_crash(mut self, enable: bool) -> Self {
        self.config.restart_on_crash = enable;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<WatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Extension list as written by users: `"js,mjs"` or `["js", "mjs"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtList {
    Csv(String),
    List(Vec<String>),
}

impl ExtList {
    /// Normalize to lowercase extensions without a leading dot
    ///
    /// Empty segments of a comma-separated string are dropped; an explicit
    /// empty entry in a list is kept so extensionless files can be watched.
    pub fn normalize(&self) -> BTreeSet<String> {
        match self {
            Self::Csv(csv) => csv
                .split(',')
                .map(normalize_extension)
                .filter(|ext| !ext.is_empty())
                .collect(),
            Self::List(list) => list.iter().map(|ext| normalize_extension(ext)).collect(),
        }
    }
}

impl From<&str> for ExtList {
    fn from(csv: &str) -> Self {
        Self::Csv(csv.to_string())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// One layer of user-supplied options
///
/// Every field is optional; absent fields fall through to the layer below.
/// The same shape is read from `nodemon.json` and built from command-line
/// flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Script to run
    #[serde(default)]
    pub script: Option<String>,
    /// Extensions to watch
    #[serde(default)]
    pub ext: Option<ExtList>,
    /// Glob patterns to ignore
    #[serde(default)]
    pub ignore: Option<Vec<String>>,
    /// Executor command
    #[serde(default)]
    pub exec: Option<String>,
    /// Settle period in seconds
    #[serde(default)]
    pub delay: Option<f64>,
    /// Directory to watch
    #[serde(default)]
    pub watch: Option<String>,
    /// Restart on crash
    #[serde(default)]
    pub restart_on_crash: Option<bool>,
}
