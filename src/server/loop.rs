// Server loop module
// Accepts connections until the listener fails or shutdown is requested

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::connection::handle_connection;
use crate::error::Result;
use crate::handler::Handler;
use crate::logger;

/// Serve `listener` until accepting fails
pub async fn serve(listener: TcpListener, handler: Handler) -> Result<()> {
    serve_with_shutdown(listener, handler, std::future::pending()).await
}

/// Serve `listener` until accepting fails or `shutdown` completes.
///
/// Connections already accepted keep running on their own tasks; only new
/// connections stop when `shutdown` fires.
pub async fn serve_with_shutdown<F>(listener: TcpListener, handler: Handler, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let handler = Arc::new(handler);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _peer_addr)) => {
                        handle_connection(stream, Arc::clone(&handler));
                    }
                    Err(e) if is_transient(&e) => {
                        logger::log_warning(&format!("Failed to accept connection: {e}"));
                    }
                    Err(e) => {
                        logger::log_error(&format!("Listener failed: {e}"));
                        return Err(e.into());
                    }
                }
            }

            () = &mut shutdown => {
                logger::log_shutdown();
                return Ok(());
            }
        }
    }
}

/// Errors that concern one pending connection rather than the listener
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
