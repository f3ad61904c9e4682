//! HTTP response building module
//!
//! Builders for the status codes the file server produces.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use super::range::ByteRange;

/// Validators and type of a file body
#[derive(Debug, Clone)]
pub struct FileHeaders<'a> {
    pub content_type: &'a str,
    pub etag: &'a str,
    pub last_modified: Option<String>,
}

/// Plain-text response for an error status
pub fn build_status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    build_text(status, text)
}

pub fn build_400_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::BAD_REQUEST)
}

pub fn build_403_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::FORBIDDEN)
}

pub fn build_404_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::NOT_FOUND)
}

pub fn build_500_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(204)
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: Option<&str>, last_modified: Option<&str>) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(304);
    if let Some(etag) = etag {
        builder = builder.header("ETag", etag);
    }
    if let Some(date) = last_modified {
        builder = builder.header("Last-Modified", date);
    }
    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("304", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(size: u64) -> Response<Full<Bytes>> {
    Response::builder()
        .status(416)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Range", format!("bytes */{size}"))
        .body(Full::new(Bytes::from("416 Range Not Satisfiable")))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(Full::new(Bytes::from("416 Range Not Satisfiable")))
        })
}

/// Build 302 redirect response
pub fn build_redirect_response(target: &str) -> Response<Full<Bytes>> {
    build_redirect(StatusCode::FOUND, target)
}

/// Build 301 redirect used to canonicalize trailing slashes
pub fn build_moved_response(target: &str) -> Response<Full<Bytes>> {
    build_redirect(StatusCode::MOVED_PERMANENTLY, target)
}

fn build_redirect(status: StatusCode, target: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Location", target)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from("Redirecting...")))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from("Redirecting...")))
        })
}

/// Build generic HTML response
pub fn build_html_response(
    content: String,
    last_modified: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    let mut builder = Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length);
    if let Some(date) = last_modified {
        builder = builder.header("Last-Modified", date);
    }
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error("HTML", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 200 response for a whole file
///
/// `size` is the entity length; for HEAD requests `data` is empty.
pub fn build_file_response(data: Bytes, size: u64, headers: &FileHeaders<'_>) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(200)
        .header("Content-Type", headers.content_type)
        .header("Content-Length", size)
        .header("Accept-Ranges", "bytes")
        .header("ETag", headers.etag);
    if let Some(date) = &headers.last_modified {
        builder = builder.header("Last-Modified", date);
    }
    builder.body(Full::new(data)).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 206 Partial Content response
pub fn build_partial_response(
    data: Bytes,
    range: ByteRange,
    size: u64,
    headers: &FileHeaders<'_>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(206)
        .header("Content-Type", headers.content_type)
        .header("Content-Length", range.len())
        .header("Content-Range", range.content_range(size))
        .header("Accept-Ranges", "bytes")
        .header("ETag", headers.etag);
    if let Some(date) = &headers.last_modified {
        builder = builder.header("Last-Modified", date);
    }
    builder.body(Full::new(data)).unwrap_or_else(|e| {
        log_build_error("206", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

fn build_text(status: StatusCode, text: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(text.clone())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from(text)))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
