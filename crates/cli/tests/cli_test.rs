//! Tests for argument parsing and status-line rendering

use clap::Parser;
use nodemon::{status_line, Cli, StatusPrinter};
use nodemon_core::config::ConfigLoader;
use nodemon_core::{ExtList, WatchConfig};
use nodemon_supervisor::{EngineEvent, ExitReason};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("nodemon-rs").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_bare_invocation_sets_no_overrides() {
    let cli = parse(&[]);
    let options = cli.to_options();

    assert_eq!(options, Default::default());
    assert!(!cli.verbose);
    assert!(cli.config.is_none());
}

#[test]
fn test_flags_map_to_options() {
    let cli = parse(&[
        "server.js",
        "--ext",
        "js,ts",
        "--exec",
        "node --inspect",
        "--delay",
        "0.25",
        "--watch",
        "src",
        "--restart-on-crash",
    ]);
    let options = cli.to_options();

    assert_eq!(options.script.as_deref(), Some("server.js"));
    assert_eq!(options.ext, Some(ExtList::Csv("js,ts".to_string())));
    assert_eq!(options.exec.as_deref(), Some("node --inspect"));
    assert_eq!(options.delay, Some(0.25));
    assert_eq!(options.watch.as_deref(), Some("src"));
    assert_eq!(options.restart_on_crash, Some(true));
}

#[test]
fn test_ignore_is_repeatable_and_comma_separated() {
    let cli = parse(&["app.js", "-i", "build/**", "--ignore", "dist/**,coverage"]);
    assert_eq!(
        cli.to_options().ignore,
        Some(vec![
            "build/**".to_string(),
            "dist/**".to_string(),
            "coverage".to_string()
        ])
    );
}

#[test]
fn test_invalid_delay_rejected_by_parser() {
    let result = Cli::try_parse_from(["nodemon-rs", "app.js", "--delay", "soon"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_layer_wins_over_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("nodemon.json"),
        r#"{ "script": "from-file.js", "delay": 2.0, "ignore": ["logs/**"] }"#,
    )
    .unwrap();

    let cli = parse(&["--delay", "0.5", "--ignore", "tmp/**"]);
    let config = ConfigLoader::new(dir.path())
        .env(HashMap::new())
        .load(&cli.to_options())
        .unwrap();

    assert_eq!(config.script_path, dir.path().join("from-file.js"));
    assert_eq!(config.restart_delay_secs, 0.5);
    assert_eq!(
        config.ignore_patterns,
        vec!["logs/**".to_string(), "tmp/**".to_string()]
    );
}

#[test]
fn test_missing_script_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(dir.path())
        .env(HashMap::new())
        .load(&parse(&[]).to_options())
        .unwrap_err();
    assert!(err.is_config());
}

fn printer(restart_on_crash: bool) -> (WatchConfig, StatusPrinter) {
    let config = WatchConfig::builder("/srv/app/server.js")
        .watch_root("/srv/app")
        .extensions(ExtList::from("js,mjs"))
        .restart_on_crash(restart_on_crash)
        .build()
        .unwrap();
    let printer = StatusPrinter::new(&config);
    (config, printer)
}

#[test]
fn test_startup_lines() {
    let (config, printer) = printer(false);
    let lines = printer.startup_lines(&config);

    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| line.starts_with("[nodemon-rs] ")));
    assert_eq!(lines[1], "[nodemon-rs] watching path: /srv/app");
    assert_eq!(lines[2], "[nodemon-rs] watching extensions: js,mjs");
    assert_eq!(lines[3], "[nodemon-rs] starting `node /srv/app/server.js`");
}

#[test]
fn test_event_status_lines() {
    let (_, printer) = printer(false);

    assert_eq!(
        printer.describe(&EngineEvent::Restarting {
            paths: vec![PathBuf::from("/srv/app/server.js")]
        }),
        Some(status_line("restarting due to changes..."))
    );
    assert_eq!(
        printer.describe(&EngineEvent::Restarted { pid: 42 }),
        Some(status_line("starting `node /srv/app/server.js`"))
    );
    assert_eq!(
        printer.describe(&EngineEvent::ChildExited {
            pid: 42,
            reason: ExitReason::Code(1),
            crashed: true
        }),
        Some(status_line(
            "app crashed - waiting for file changes before starting..."
        ))
    );
    assert_eq!(
        printer.describe(&EngineEvent::ChildExited {
            pid: 42,
            reason: ExitReason::Code(0),
            crashed: false
        }),
        Some(status_line("clean exit - waiting for changes before restart"))
    );
    assert_eq!(printer.describe(&EngineEvent::Started { pid: 42 }), None);
    assert_eq!(printer.describe(&EngineEvent::Stopped), None);
}

#[test]
fn test_spawn_failure_includes_cause() {
    let (_, printer) = printer(false);
    let line = printer
        .describe(&EngineEvent::SpawnFailed {
            message: "Failed to start `node`: not found".to_string(),
        })
        .unwrap();
    assert_eq!(
        line,
        "[nodemon-rs] failed to start process: Failed to start `node`: not found"
    );
}

#[test]
fn test_crash_line_with_restart_on_crash() {
    let (_, printer) = printer(true);
    assert_eq!(
        printer.describe(&EngineEvent::ChildExited {
            pid: 7,
            reason: ExitReason::Signal(9),
            crashed: true
        }),
        Some(status_line("app crashed - restarting..."))
    );
}
