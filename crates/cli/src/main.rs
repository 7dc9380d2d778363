//! nodemon-rs - restart a script whenever its source files change
//!
//! This binary resolves the layered configuration, prints status lines and
//! keeps the watch engine running until it receives an interrupt.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use nodemon::{status_line, Cli, StatusPrinter};
use nodemon_core::config::ConfigLoader;
use nodemon_core::WatchConfig;
use nodemon_supervisor::{EngineEvent, WatchEngine};
use std::env;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", status_line(format!("{e:#}")));
            eprintln!("{}", Cli::command().render_usage());
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", status_line(format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging system
///
/// Logs go to stderr so status lines and the child's output own stdout.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "nodemon={level},nodemon_core={level},nodemon_watcher={level},nodemon_supervisor={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<WatchConfig> {
    let cwd = env::current_dir().context("Failed to get current directory")?;

    let mut loader = ConfigLoader::new(&cwd);
    if let Some(path) = &cli.config {
        loader = loader.config_file(path);
    }

    let config = loader.load(&cli.to_options())?;
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

/// Supervise the script until an interrupt arrives
async fn run(config: WatchConfig) -> Result<()> {
    let printer = StatusPrinter::new(&config);
    for line in printer.startup_lines(&config) {
        println!("{line}");
    }

    let engine = WatchEngine::new(config);
    let events = engine.subscribe();
    let status_task = tokio::spawn(print_events(printer, events));

    let mut handle = engine.spawn()?;

    wait_for_shutdown_signal().await?;
    info!("Shutdown signal received");
    println!("{}", status_line("terminating"));

    handle.kill().await?;
    status_task.abort();
    Ok(())
}

async fn print_events(printer: StatusPrinter, mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = printer.describe(&event) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Status printer skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for interrupt"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for interrupt")
}
