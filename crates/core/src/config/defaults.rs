//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_EXTENSIONS: &str = "js,mjs,json";
pub(crate) const DEFAULT_EXECUTOR: &str = "node";
pub(crate) const DEFAULT_DELAY_SECS: f64 = 1.0;
pub(crate) const DEFAULT_WATCH_ROOT: &str = ".";

/// File name of the project-level configuration file
pub const CONFIG_FILE_NAME: &str = "nodemon.json";

/// File name of the project manifest consulted for a `main` entry
pub const PACKAGE_MANIFEST_NAME: &str = "package.json";

/// Prefix for environment variable overrides (`NODEMON_DELAY=0.5`)
pub const ENV_PREFIX: &str = "NODEMON";

pub(crate) fn default_ignore_patterns() -> Vec<String> {
    vec![
        // Dependencies
        "node_modules/**/*".to_string(),
        // Version control
        ".git".to_string(),
    ]
}

pub(crate) fn default_extensions() -> std::collections::BTreeSet<String> {
    super::ExtList::Csv(DEFAULT_EXTENSIONS.to_string()).normalize()
}
