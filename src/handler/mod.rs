//! Request handler module
//!
//! Builds the [`Handler`] for a pathspec and dispatches requests to the
//! static responder.

pub mod router;
pub mod static_files;

use std::sync::Arc;

use crate::error::Result;
use crate::pathspec;
use crate::vfs::ZipFs;

// Re-export main entry point
pub use router::{handle_request, Handler};

/// Build a handler for `pathspec`
///
/// With `zip` set the whole pathspec is the path of one archive whose
/// contents are served from `/`. Otherwise it is parsed into aliases.
/// Alias targets are not checked here; a missing target only produces 404s.
pub fn new(pathspec: &str, zip: bool, debug: bool) -> Result<Handler> {
    if zip {
        let fs = ZipFs::open(pathspec)?;
        return Ok(Handler::archived(fs, debug));
    }
    let aliases = pathspec::parse(pathspec)?;
    Ok(Handler::aliased(Arc::new(aliases), debug))
}
