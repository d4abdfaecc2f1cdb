//! Error types for atomic file operations.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Permission denied during {op} on {}: {source}", .path.display())]
    Permission {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Installed {} but could not remove staged source {}: {source}",
        .installed.display(),
        .staged.display()
    )]
    SourceLeftBehind {
        installed: PathBuf,
        staged: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write callback failed: {0}")]
    Callback(Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl Error {
    /// True for errors the writer recovers from by assuming defaults.
    pub fn is_recoverable_lookup(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
