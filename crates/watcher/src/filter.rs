//! Relevance filtering for changed paths
//!
//! A change is relevant when it is not under an ignore pattern and its
//! extension is one of the watched extensions. Patterns are compiled once
//! when the filter is built; [`PathFilter::accept`] performs no I/O.

use crate::events::ChangeEvent;
use glob::{MatchOptions, Pattern};
use nodemon_core::{Error, Result, WatchConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// `*` stays within one segment, `**` spans segments
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides whether a changed path should trigger a restart
#[derive(Clone, Debug)]
pub struct PathFilter {
    /// Watch root, as configured and canonicalized
    roots: Arc<Vec<PathBuf>>,
    /// Script path, as configured and canonicalized
    scripts: Arc<Vec<PathBuf>>,
    /// Compiled ignore patterns
    patterns: Arc<Vec<Pattern>>,
    /// Lowercase extensions without leading dot
    extensions: Arc<BTreeSet<String>>,
}

impl PathFilter {
    /// Compile the filter for a configuration
    pub fn new(config: &WatchConfig) -> Result<Self> {
        let mut patterns = Vec::with_capacity(config.ignore_patterns.len());
        for source in &config.ignore_patterns {
            for variant in pattern_variants(source) {
                let pattern = Pattern::new(&variant).map_err(|e| {
                    Error::config(format!("Invalid ignore pattern '{source}': {e}"))
                })?;
                patterns.push(pattern);
            }
        }

        Ok(Self {
            roots: Arc::new(with_canonical(&config.watch_root)),
            scripts: Arc::new(with_canonical(&config.script_path)),
            patterns: Arc::new(patterns),
            extensions: Arc::new(config.extensions.clone()),
        })
    }

    /// Check whether a change event is relevant
    pub fn accept(&self, event: &ChangeEvent) -> bool {
        self.accept_path(&event.path, event.is_dir)
    }

    /// Check whether a changed path is relevant
    ///
    /// Directories are only checked against ignore patterns and never
    /// trigger a restart on their own.
    pub fn accept_path(&self, path: &Path, is_dir: bool) -> bool {
        if self.is_ignored(path) {
            trace!("Ignoring path: {:?}", path);
            return false;
        }

        if is_dir {
            return false;
        }

        if self.scripts.iter().any(|script| script == path) {
            return true;
        }

        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let accepted = self.extensions.contains(&ext);
        if !accepted {
            trace!("Extension {:?} not watched: {:?}", ext, path);
        }
        accepted
    }

    /// Check if a path, or any directory above it, matches an ignore pattern
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = self.relative_path(path);
        if relative.is_empty() {
            return false;
        }

        // Every ancestor prefix is a candidate so an ignored directory covers its subtree
        let mut candidates = relative
            .match_indices('/')
            .map(|(i, _)| &relative[..i])
            .filter(|prefix| !prefix.is_empty())
            .chain(std::iter::once(relative.as_str()));

        candidates.any(|candidate| {
            self.patterns
                .iter()
                .any(|pattern| pattern.matches_with(candidate, MATCH_OPTIONS))
        })
    }

    /// Forward-slash path relative to the watch root
    ///
    /// Paths outside the watch root are returned whole.
    pub fn relative_path(&self, path: &Path) -> String {
        let relative = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        let normalized = relative.to_string_lossy().replace('\\', "/");
        normalized.trim_start_matches("./").to_string()
    }
}

/// A pattern plus the directory stem of a `dir/**` or `dir/**/*` pattern
///
/// The stem lets the directory itself match, which covers its whole subtree
/// through the ancestor check in [`PathFilter::is_ignored`].
fn pattern_variants(source: &str) -> Vec<String> {
    let trimmed = source.trim().trim_start_matches("./");
    let mut variants = vec![trimmed.to_string()];

    let stem = trimmed
        .strip_suffix("/**/*")
        .or_else(|| trimmed.strip_suffix("/**"))
        .or_else(|| trimmed.strip_suffix('/'));
    if let Some(stem) = stem.filter(|s| !s.is_empty() && *s != "**") {
        variants.push(stem.to_string());
    }

    variants
}

fn with_canonical(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize() {
        if canonical != path {
            paths.push(canonical);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use nodemon_core::ExtList;

    fn filter_with(ext: &str, ignore: &[&str]) -> PathFilter {
        let config = WatchConfig::builder("/srv/app/server.js")
            .extensions(ExtList::from(ext))
            .ignore_patterns(ignore.iter().map(|p| p.to_string()).collect())
            .build()
            .expect("test setup failed");
        PathFilter::new(&config).expect("test setup failed")
    }

    fn accepts(filter: &PathFilter, path: &str) -> bool {
        filter.accept_path(Path::new(path), false)
    }

    #[test]
    fn test_node_modules_rejected() {
        let filter = filter_with("js", &["node_modules/**"]);
        assert!(!accepts(&filter, "/srv/app/node_modules/foo/bar.js"));
        assert!(!accepts(&filter, "node_modules/foo/bar.js"));
        assert!(accepts(&filter, "/srv/app/lib/bar.js"));
    }

    #[test]
    fn test_default_patterns_cover_subtrees() {
        let config = WatchConfig::new("/srv/app/server.js");
        let filter = PathFilter::new(&config).expect("test setup failed");

        assert!(filter.is_ignored(Path::new("/srv/app/node_modules/express/index.js")));
        assert!(filter.is_ignored(Path::new("/srv/app/.git/HEAD")));
        assert!(filter.is_ignored(Path::new("/srv/app/.git")));
        assert!(!filter.is_ignored(Path::new("/srv/app/src/.gitkeep")));
    }

    #[test]
    fn test_extension_membership() {
        let filter = filter_with("js,mjs", &[]);
        assert!(!accepts(&filter, "styles.css"));
        assert!(accepts(&filter, "app.mjs"));
        assert!(accepts(&filter, "LEGACY.JS"));
        assert!(!accepts(&filter, "Makefile"));
    }

    #[test]
    fn test_empty_extension_allows_extensionless_files() {
        let config = WatchConfig::builder("/srv/app/server.js")
            .extensions(ExtList::List(vec!["".to_string(), "js".to_string()]))
            .build()
            .expect("test setup failed");
        let filter = PathFilter::new(&config).expect("test setup failed");

        assert!(accepts(&filter, "/srv/app/Procfile"));
        assert!(!accepts(&filter, "/srv/app/notes.txt"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let filter = filter_with("js", &["*.test.js", "build/**"]);
        assert!(!accepts(&filter, "/srv/app/unit.test.js"));
        assert!(accepts(&filter, "/srv/app/src/unit.test.js"));
        assert!(!accepts(&filter, "/srv/app/build/output.js"));
        assert!(!accepts(&filter, "/srv/app/build/nested/deep/output.js"));
    }

    #[test]
    fn test_double_star_spans_segments() {
        let filter = filter_with("js", &["**/fixtures/**"]);
        assert!(!accepts(&filter, "/srv/app/test/fixtures/a.js"));
        assert!(!accepts(&filter, "/srv/app/fixtures/a.js"));
        assert!(accepts(&filter, "/srv/app/test/a.js"));
    }

    #[test]
    fn test_directories_never_trigger() {
        let filter = filter_with("js", &["build/**"]);
        let dir = ChangeEvent::dir("/srv/app/lib.js", ChangeKind::Created);
        assert!(!filter.accept(&dir));
        assert!(filter.is_ignored(Path::new("/srv/app/build")));
    }

    #[test]
    fn test_script_always_relevant_unless_ignored() {
        let config = WatchConfig::builder("/srv/app/main.py")
            .executor("python3")
            .build()
            .expect("test setup failed");
        let filter = PathFilter::new(&config).expect("test setup failed");

        assert!(accepts(&filter, "/srv/app/main.py"));
        assert!(!accepts(&filter, "/srv/app/other.py"));
    }

    #[test]
    fn test_relative_script_matches_watcher_paths() {
        let config = WatchConfig::builder("main.py")
            .executor("python3")
            .build()
            .expect("test setup failed");
        let filter = PathFilter::new(&config).expect("test setup failed");

        // The watcher reports absolute paths under the watch root
        let cwd = std::env::current_dir().expect("test setup failed");
        assert_eq!(config.watch_root, cwd);
        assert!(accepts(&filter, &cwd.join("main.py").to_string_lossy()));
        assert!(!accepts(&filter, &cwd.join("other.py").to_string_lossy()));
        assert_eq!(filter.relative_path(&cwd.join("main.py")), "main.py");
    }

    #[test]
    fn test_accept_is_deterministic() {
        let filter = filter_with("js,mjs,json", &["node_modules/**/*", ".git"]);
        let paths = [
            "/srv/app/server.js",
            "/srv/app/.git/index",
            "/srv/app/package.json",
            "/srv/app/README.md",
        ];
        for path in paths {
            assert_eq!(accepts(&filter, path), accepts(&filter, path));
        }
    }

    #[test]
    fn test_relative_path_normalization() {
        let filter = filter_with("js", &[]);
        assert_eq!(filter.relative_path(Path::new("/srv/app/src/a.js")), "src/a.js");
        assert_eq!(filter.relative_path(Path::new("./src/a.js")), "src/a.js");
        assert_eq!(filter.relative_path(Path::new("/elsewhere/a.js")), "/elsewhere/a.js");
    }

    #[test]
    fn test_pattern_variants() {
        assert_eq!(
            pattern_variants("build/**"),
            vec!["build/**".to_string(), "build".to_string()]
        );
        assert_eq!(
            pattern_variants("./node_modules/**/*"),
            vec!["node_modules/**/*".to_string(), "node_modules".to_string()]
        );
        assert_eq!(pattern_variants("**/*"), vec!["**/*".to_string()]);
        assert_eq!(pattern_variants(".git"), vec![".git".to_string()]);
    }
}
