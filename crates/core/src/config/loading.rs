//! Configuration loading from defaults, files, environment variables and flags

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::defaults::*;
use super::{ExtList, WatchConfig, WatchOptions};

type Builder = LibConfigBuilder<config::builder::DefaultState>;

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: Builder,
    key: &str,
    value: T,
) -> Result<Builder> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

/// Helper to apply a command-line value on top of every other layer
fn set_config_override<T: Into<config::Value>>(
    builder: Builder,
    key: &str,
    value: Option<T>,
) -> Result<Builder> {
    match value {
        Some(value) => builder
            .set_override(key, value)
            .map_err(|e| Error::config(format!("Failed to set {key}: {e}"))),
        None => Ok(builder),
    }
}

/// Resolves one [`WatchConfig`] from layered sources
///
/// Precedence, lowest first: built-in defaults, the config file
/// (`nodemon.json` in the working directory unless another path is given),
/// `NODEMON_*` environment variables, command-line options. Ignore patterns
/// given on the command line extend the resolved list instead of replacing it.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cwd: PathBuf,
    config_file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a loader rooted at the given working directory
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config_file: None,
            env: None,
        }
    }

    /// Use an explicit config file; unlike the implicit `nodemon.json`, it must exist
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Replace the process environment with the given variables
    pub fn env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Merge every layer under `cli` and produce the final configuration
    pub fn load(&self, cli: &WatchOptions) -> Result<WatchConfig> {
        let builder = ConfigLib::builder();
        let builder = set_config_default(builder, "ext", DEFAULT_EXTENSIONS)?;
        let builder = set_config_default(builder, "ignore", default_ignore_patterns())?;
        let builder = set_config_default(builder, "exec", DEFAULT_EXECUTOR)?;
        let builder = set_config_default(builder, "delay", DEFAULT_DELAY_SECS)?;
        let builder = set_config_default(builder, "watch", DEFAULT_WATCH_ROOT)?;
        let mut builder = set_config_default(builder, "restart_on_crash", false)?;

        // Add the config file: an explicit one is required, the implicit one optional
        match &self.config_file {
            Some(path) => {
                let path = self.absolute(path);
                debug!("Loading config file {:?}", path);
                builder = builder
                    .add_source(File::from(path.as_path()).format(FileFormat::Json).required(true));
            }
            None => {
                let path = self.cwd.join(CONFIG_FILE_NAME);
                if path.exists() {
                    debug!("Loading config file {:?}", path);
                    builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Json));
                }
            }
        }

        // Add environment variables with NODEMON_ prefix
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore")
                .source(self.env.clone()),
        );

        let builder = set_config_override(builder, "script", cli.script.clone())?;
        let builder = set_config_override(
            builder,
            "ext",
            cli.ext.as_ref().map(|ext| match ext {
                ExtList::Csv(csv) => config::Value::from(csv.clone()),
                ExtList::List(list) => config::Value::from(list.clone()),
            }),
        )?;
        let builder = set_config_override(builder, "exec", cli.exec.clone())?;
        let builder = set_config_override(builder, "delay", cli.delay)?;
        let builder = set_config_override(builder, "watch", cli.watch.clone())?;
        let builder = set_config_override(builder, "restart_on_crash", cli.restart_on_crash)?;

        let merged: WatchOptions = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to load configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to parse configuration: {e}")))?;

        self.finish(merged, cli)
    }

    fn finish(&self, merged: WatchOptions, cli: &WatchOptions) -> Result<WatchConfig> {
        let script = match merged.script.filter(|s| !s.trim().is_empty()) {
            Some(script) => script,
            None => self.package_main()?,
        };

        let mut ignore_patterns = merged.ignore.unwrap_or_default();
        if let Some(extra) = &cli.ignore {
            ignore_patterns.extend(extra.iter().cloned());
        }

        let config = WatchConfig {
            script_path: self.absolute(Path::new(&script)),
            extensions: merged
                .ext
                .map(|ext| ext.normalize())
                .unwrap_or_else(default_extensions),
            ignore_patterns,
            executor: merged.exec.unwrap_or_else(|| DEFAULT_EXECUTOR.to_string()),
            restart_delay_secs: merged.delay.unwrap_or(DEFAULT_DELAY_SECS),
            watch_root: self.absolute(Path::new(
                merged.watch.as_deref().unwrap_or(DEFAULT_WATCH_ROOT),
            )),
            restart_on_crash: merged.restart_on_crash.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fall back to the `main` entry of the project manifest
    fn package_main(&self) -> Result<String> {
        let manifest = self.cwd.join(PACKAGE_MANIFEST_NAME);
        let contents = std::fs::read_to_string(&manifest).map_err(|e| {
            Error::config(format!(
                "No script specified and could not read {}: {e}",
                manifest.display()
            ))
        })?;

        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            warn!("Malformed {}: {e}", manifest.display());
            Error::config(format!("Failed to parse {}: {e}", manifest.display()))
        })?;

        value
            .get("main")
            .and_then(serde_json::Value::as_str)
            .filter(|main| !main.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::config("No script specified to run"))
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        let joined = self.cwd.join(path);
        // Collapse `./` components so prefix stripping against the watch root works
        joined.components().collect()
    }
}

impl WatchConfig {
    /// Resolve a configuration for `cwd` using the real process environment
    pub fn resolve(cwd: impl Into<PathBuf>, cli: &WatchOptions) -> Result<Self> {
        ConfigLoader::new(cwd).load(cli)
    }
}
