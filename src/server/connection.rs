// Connection handling module
// Serves one accepted TCP connection on its own task

use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;

use crate::handler::{self, Handler};
use crate::logger;

/// Serve `stream` with `handler` in a spawned task.
///
/// Keep-alive is on; the task ends when the client closes the connection.
/// Protocol errors are logged and only affect this connection.
pub fn handle_connection(stream: tokio::net::TcpStream, handler: Arc<Handler>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.keep_alive(true);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&handler))),
        );

        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }
    });
}
