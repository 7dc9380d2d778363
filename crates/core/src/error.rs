use thiserror::Error;

/// Result type for nodemon-rs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nodemon-rs operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No resolvable script, malformed config file or invalid option values
    #[error("Configuration error: {0}")]
    Config(String),

    /// The executor could not be located or failed to exec
    #[error("Failed to start `{executor}`: {source}")]
    Spawn {
        executor: String,
        #[source]
        source: std::io::Error,
    },

    /// File watching errors
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Process management errors
    #[error("Process management error: {0}")]
    Process(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a spawn error for the given executor
    pub fn spawn(executor: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            executor: executor.into(),
            source,
        }
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates a process management error
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for errors that mean the configuration could not be resolved
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True for errors raised while launching the executor
    pub fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
