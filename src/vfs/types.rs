//! Core VFS types.

use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Entry metadata as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileType,
    /// Size in bytes (zero for directories).
    pub size: u64,
    /// Last modification time, when the backend records one.
    pub modified: Option<SystemTime>,
}

impl Metadata {
    pub const fn file(size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            kind: FileType::File,
            size,
            modified,
        }
    }

    pub const fn directory(modified: Option<SystemTime>) -> Self {
        Self {
            kind: FileType::Directory,
            size: 0,
            modified,
        }
    }

    pub const fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Convert `std::fs::Metadata`, following the OS view of the entry.
    pub fn from_std(meta: &std::fs::Metadata) -> Self {
        let modified = meta.modified().ok();
        if meta.is_dir() {
            Self::directory(modified)
        } else {
            Self::file(meta.len(), modified)
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileType,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileType::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileType::Directory,
        }
    }
}
