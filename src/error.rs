//! Error types and the crate `Result` alias.
//!
//! An engine answering `?` is not an error at this level: it is an ordinary
//! response classified by [`crate::response::parse`].

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required engine artifact is missing. Raised before any spawn.
    #[error("{kind} not found: {}", path.display())]
    MissingArtifact { kind: &'static str, path: PathBuf },

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("engine process is not running")]
    NotRunning,

    #[error("engine process is already running")]
    AlreadyRunning,

    #[error("engine did not answer `{command}` within {elapsed:?}")]
    Timeout { command: String, elapsed: Duration },

    #[error("engine exited while answering `{command}`")]
    ProcessExited { command: String },

    #[error("engine exited during startup")]
    ExitedDuringStartup,

    #[error("readiness check `{command}` failed: {content}")]
    ReadyCheckFailed { command: String, content: String },

    #[error("failed to send {signal}: {reason}")]
    Signal { signal: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}
