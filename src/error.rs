//! Construction and serve errors
//!
//! Everything here is fatal for server startup. Per-request failures use
//! [`crate::vfs::VfsError`] instead and only affect a single response.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error returned while building or running the file server
#[derive(Debug, Error)]
pub enum Error {
    /// A pathspec token could not be parsed
    #[error("invalid pathspec: {0}")]
    MalformedPathspec(String),

    /// Path resolution or listener I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip archive could not be opened or its central directory is unreadable
    #[error("unable to open zip archive '{}': {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPathspec(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
