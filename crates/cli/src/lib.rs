//! Library interface for the nodemon-rs CLI
//!
//! Argument parsing and status-line rendering live here so they can be
//! tested without spawning the binary.

use clap::Parser;
use nodemon_core::{ExtList, WatchConfig, WatchOptions};
use nodemon_supervisor::EngineEvent;
use std::path::PathBuf;

/// Prefix of every human-readable status line
pub const STATUS_PREFIX: &str = "[nodemon-rs]";

#[derive(Parser, Debug)]
#[command(name = "nodemon-rs")]
#[command(about = "Restart a script whenever its source files change")]
#[command(version)]
pub struct Cli {
    /// Script to run; defaults to `main` in package.json
    #[arg(value_name = "SCRIPT")]
    pub script: Option<String>,

    /// Extensions to watch, comma separated
    #[arg(short, long, value_name = "LIST")]
    pub ext: Option<String>,

    /// Glob pattern to ignore, repeatable or comma separated
    #[arg(short, long, value_name = "PATTERN", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Executor used to run the script
    #[arg(short = 'x', long, value_name = "CMD")]
    pub exec: Option<String>,

    /// Seconds to wait for changes to settle before restarting
    #[arg(short, long, value_name = "SECONDS")]
    pub delay: Option<f64>,

    /// Directory to watch recursively
    #[arg(short, long, value_name = "DIR")]
    pub watch: Option<String>,

    /// Also restart when the script exits with a failure
    #[arg(long)]
    pub restart_on_crash: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The command-line layer of the configuration
    pub fn to_options(&self) -> WatchOptions {
        WatchOptions {
            script: self.script.clone(),
            ext: self.ext.clone().map(ExtList::Csv),
            ignore: (!self.ignore.is_empty()).then(|| self.ignore.clone()),
            exec: self.exec.clone(),
            delay: self.delay,
            watch: self.watch.clone(),
            restart_on_crash: self.restart_on_crash.then_some(true),
        }
    }
}

/// Prefix a message as a status line
pub fn status_line(message: impl AsRef<str>) -> String {
    format!("{STATUS_PREFIX} {}", message.as_ref())
}

/// Renders engine activity as status lines
#[derive(Debug, Clone)]
pub struct StatusPrinter {
    command: String,
    restart_on_crash: bool,
}

impl StatusPrinter {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            command: format!("{} {}", config.executor, config.script_path.display()),
            restart_on_crash: config.restart_on_crash,
        }
    }

    /// Lines printed before the first child starts
    pub fn startup_lines(&self, config: &WatchConfig) -> Vec<String> {
        vec![
            status_line(env!("CARGO_PKG_VERSION")),
            status_line(format!("watching path: {}", config.watch_root.display())),
            status_line(format!("watching extensions: {}", config.extensions_display())),
            self.starting_line(),
        ]
    }

    fn starting_line(&self) -> String {
        status_line(format!("starting `{}`", self.command))
    }

    /// Status line for an engine event, if it warrants one
    pub fn describe(&self, event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::Restarting { .. } => Some(status_line("restarting due to changes...")),
            EngineEvent::Restarted { .. } => Some(self.starting_line()),
            EngineEvent::SpawnFailed { message } => {
                Some(status_line(format!("failed to start process: {message}")))
            }
            EngineEvent::ChildExited { crashed: true, .. } if self.restart_on_crash => {
                Some(status_line("app crashed - restarting..."))
            }
            EngineEvent::ChildExited { crashed: true, .. } => Some(status_line(
                "app crashed - waiting for file changes before starting...",
            )),
            EngineEvent::ChildExited { crashed: false, .. } => Some(status_line(
                "clean exit - waiting for changes before restart",
            )),
            EngineEvent::Started { .. } | EngineEvent::ShuttingDown | EngineEvent::Stopped => None,
        }
    }
}
