//! VFS error types.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Per-request filesystem error.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Translate an OS error on `path` into the VFS vocabulary.
    ///
    /// `ENOTDIR` is reported as not found: a path that walks through a file
    /// simply does not exist in the tree.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let display = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::NotFound(display),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(display),
            _ => Self::Io(err),
        }
    }
}

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;
