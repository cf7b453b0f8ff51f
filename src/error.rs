//! Error types for ytdl-runner
//!
//! Two layers of failure exist:
//! - [`LaunchError`] is raised synchronously when the downloader executable
//!   cannot be spawned. It is never retried.
//! - [`Error`] is the crate-wide error returned by configuration, command
//!   construction and session management calls.
//!
//! A downloader that runs and exits non-zero is not an error at this level; it
//! is reported through the session's event sink once retries are exhausted.

use thiserror::Error;

/// Result type alias for ytdl-runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ytdl-runner
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "process.encoding")
        key: Option<String>,
    },

    /// The downloader process could not be started
    #[error("launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Command line is unusable (e.g. empty argument vector)
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A session is still running on this orchestrator
    #[error("a download session is already running")]
    SessionActive,

    /// None of the configured downloader executables could be found
    #[error("no downloader executable found (tried: {})", candidates.join(", "))]
    DownloaderNotFound {
        /// The executable names that were searched for
        candidates: Vec<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure to spawn the external downloader
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The executable does not exist or is not on `PATH`
    #[error("executable not found: {program}")]
    NotFound {
        /// Program name or path that was launched
        program: String,
    },

    /// The executable exists but may not be executed by this user
    #[error("permission denied launching {program}")]
    PermissionDenied {
        /// Program name or path that was launched
        program: String,
    },

    /// Any other spawn failure reported by the OS
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program name or path that was launched
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// `start` was called outside of a tokio runtime
    #[error("no tokio runtime available to supervise {program}")]
    NoRuntime {
        /// Program name or path that was launched
        program: String,
    },
}

impl LaunchError {
    /// Classify a spawn error by its [`std::io::ErrorKind`]
    pub fn from_io(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => LaunchError::NotFound { program },
            std::io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied { program },
            _ => LaunchError::Spawn { program, source },
        }
    }

    /// The program whose launch failed
    pub fn program(&self) -> &str {
        match self {
            LaunchError::NotFound { program }
            | LaunchError::PermissionDenied { program }
            | LaunchError::Spawn { program, .. }
            | LaunchError::NoRuntime { program } => program,
        }
    }
}
