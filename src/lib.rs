//! HTTP file server for local paths and zip archives
//!
//! A pathspec such as `"/srv/www /home/me/notes.txt:notes"` maps URL
//! prefixes (aliases) onto files and directories; in zip mode the pathspec
//! is a single archive whose contents are served from `/`.
//!
//! ```no_run
//! # async fn run() -> fileserver::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! fileserver::serve(listener, "/srv/www", false, true).await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod pathspec;
pub mod server;
pub mod vfs;

pub use error::{Error, Result};
pub use handler::{new, Handler};

/// Build a handler for `pathspec` and serve `listener` with it
///
/// Returns only when construction fails or the listener does.
pub async fn serve(
    listener: tokio::net::TcpListener,
    pathspec: &str,
    zip: bool,
    debug: bool,
) -> Result<()> {
    let handler = new(pathspec, zip, debug)?;
    server::serve(listener, handler).await
}
