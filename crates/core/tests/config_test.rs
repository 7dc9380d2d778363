use nodemon_core::config::ConfigLoader;
use nodemon_core::{ExtList, WatchConfig, WatchOptions};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn cli_script(script: &str) -> WatchOptions {
    WatchOptions {
        script: Some(script.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_watch_config_defaults() {
    let config = WatchConfig::new("/srv/app/server.js");
    assert_eq!(config.executor, "node");
    assert_eq!(config.extensions_display(), "js,json,mjs");
    assert_eq!(config.restart_delay_secs, 1.0);
    assert_eq!(config.watch_root, Path::new("/srv/app"));
    assert!(!config.restart_on_crash);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_delay() {
    let mut config = WatchConfig::new("server.js");

    config.restart_delay_secs = 0.0;
    assert!(config.validate().is_ok());

    config.restart_delay_secs = -1.0;
    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid delay"));

    config.restart_delay_secs = f64::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_executor() {
    let mut config = WatchConfig::new("server.js");

    config.executor = "   ".to_string();
    assert!(config.validate().unwrap_err().is_config());

    config.executor = "deno run".to_string();
    assert!(config.validate().is_ok());
    assert_eq!(config.executor_command(), Some(("deno", vec!["run"])));
}

#[test]
fn test_env_layer_between_file_and_cli() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("nodemon.json"),
        r#"{ "exec": "node", "delay": 2.0, "ext": ["ts"] }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path())
        .env(env(&[("NODEMON_EXEC", "deno"), ("NODEMON_DELAY", "0.5")]))
        .load(&WatchOptions {
            delay: Some(0.1),
            ..cli_script("main.ts")
        })
        .unwrap();

    assert_eq!(config.executor, "deno");
    assert_eq!(config.restart_delay_secs, 0.1);
    assert_eq!(config.extensions_display(), "ts");
}

#[test]
fn test_package_main_fallback() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("package.json"),
        r#"{ "name": "demo", "main": "index.js" }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path())
        .env(HashMap::new())
        .load(&WatchOptions::default())
        .unwrap();
    assert_eq!(config.script_path, dir.path().join("index.js"));
    assert_eq!(config.watch_root, dir.path());
}

#[test]
fn test_no_script_anywhere_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(dir.path())
        .env(HashMap::new())
        .load(&WatchOptions::default())
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_ext_list_forms_are_equivalent() {
    assert_eq!(
        ExtList::from("js, .MJS").normalize(),
        ExtList::List(vec!["js".to_string(), "mjs".to_string()]).normalize()
    );
}
