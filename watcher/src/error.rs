//! Error types for the watcher.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that abort a watch session.
///
/// Only setup failures surface here. Recoverable conditions (a
/// subdirectory that cannot be registered, overflow, an unrecognized
/// handle) go to the session's error sink and the session keeps running.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The root directory could not be registered at all.
    #[error("cannot watch root directory {}: {source}", .path.display())]
    RootRegistration {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Invalid session configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Notify backend error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
