//! Virtual filesystem layer
//!
//! Both backends present a read-only tree addressed by `/`-separated virtual
//! paths:
//! - [`AliasFs`]: first path segment selects an alias, the rest resolves on disk
//! - [`ZipFs`]: paths resolve against the entries recorded in one zip archive
//!
//! The HTTP layer only ever sees `dyn FileSystem`.

pub mod alias;
pub mod archive;
mod entry;
mod error;
pub mod path;
mod types;

use std::io::{Read, Seek};

pub use alias::AliasFs;
pub use archive::ZipFs;
pub use error::{VfsError, VfsResult};
pub use types::{DirEntry, FileType, Metadata};

/// Readable, seekable file handle.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Open file returned by [`FileSystem::open`].
pub type VfsFile = Box<dyn ReadSeek>;

/// Read-only filesystem operations shared by every backend.
///
/// Calls are synchronous and may block on disk I/O; async callers should run
/// them on a blocking thread. Paths are virtual and are cleaned by the backend,
/// so `..` never escapes the tree.
pub trait FileSystem: Send + Sync {
    /// Open a regular file for reading.
    fn open(&self, path: &str) -> VfsResult<VfsFile>;

    /// Get entry metadata.
    fn stat(&self, path: &str) -> VfsResult<Metadata>;

    /// List a directory, sorted by name.
    fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// Short backend name for logging.
    fn name(&self) -> &'static str;
}
