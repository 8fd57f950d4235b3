use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the replicated file system and its transports.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration (bad key=value line, missing
    /// share-group descriptor, invalid remote command template). Fatal at
    /// construction time, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database root exists but is not a directory.
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A remote transport command exited non-zero or was killed by a signal.
    /// Carries the rendered command line for diagnostics.
    #[error("Command failed ({status}): {command}")]
    CommandFailed { command: String, status: ExitStatus },

    /// Operation on a file system instance that has already been closed,
    /// including a second call to `close`.
    #[error("File system is closed")]
    Closed,

    /// `release` of a path this process never locked.
    #[error("Not locked: {}", .0.display())]
    NotLocked(PathBuf),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}
