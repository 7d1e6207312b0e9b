use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for cleanup operations.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// A specialized subsystem could not determine the current system state.
    #[error("{0}")]
    Detection(String),

    /// Removal without elevation hit a permission error.
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// An external command could not be started or exited non-zero.
    #[error("{context}: {message}")]
    Command { context: String, message: String },

    /// An external command ran past its time budget and was killed.
    #[error("{context}: `{program}` timed out after {}s", timeout.as_secs())]
    Timeout {
        context: String,
        program: String,
        timeout: Duration,
    },

    /// Filesystem error wrapped with what was being attempted.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A target's filename pattern is not a valid glob.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The configuration file is unreadable or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CleanupError {
    /// Wrap an I/O error with context, promoting permission errors to their own kind.
    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            CleanupError::PermissionDenied { path: path.into() }
        } else {
            CleanupError::Io {
                context: context.into(),
                source,
            }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CleanupError::PermissionDenied { .. })
    }
}

/// Result type alias for cleanup operations.
pub type Result<T> = std::result::Result<T, CleanupError>;
