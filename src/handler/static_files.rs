//! Static file serving module
//!
//! Serves any [`FileSystem`] over HTTP: trailing-slash canonicalization,
//! `index.html`, directory listings, conditional requests, single byte
//! ranges and content-type detection. Everything here is synchronous and is
//! run on the blocking pool by the router.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::handler::router::RequestContext;
use crate::http::response::{build_file_response, build_html_response, build_partial_response, FileHeaders};
use crate::http::{self, cache, listing, mime, RangeParseResult};
use crate::logger;
use crate::vfs::{path, FileSystem, Metadata, VfsError, VfsFile};

const INDEX_PAGE: &str = "index.html";

/// Respond to a GET or HEAD request for `ctx.path`
pub fn serve(fs: &dyn FileSystem, ctx: &RequestContext) -> Response<Full<Bytes>> {
    // Redirects are relative, and clients resolve them against the path as
    // sent, so slash checks and the base use `raw_path` rather than the
    // decoded form (an encoded `%2F` is not a separator here)

    // `/dir/index.html` is always addressed as `/dir/`
    if ctx.raw_path.ends_with("/index.html") {
        return local_redirect(ctx, "./");
    }

    let name = path::clean(&ctx.path);
    let meta = match fs.stat(&name) {
        Ok(meta) => meta,
        Err(e) => return error_response(&e),
    };

    let has_slash = ctx.raw_path.ends_with('/');
    let base = path::base(&ctx.raw_path);
    if meta.is_dir() {
        if !has_slash {
            return local_redirect(ctx, &format!("{base}/"));
        }
        return serve_directory(fs, &name, &meta, ctx);
    }
    if has_slash {
        return local_redirect(ctx, &format!("../{base}"));
    }
    serve_file(fs, &name, &meta, ctx)
}

/// Serve `index.html` when present, otherwise a listing
fn serve_directory(
    fs: &dyn FileSystem,
    dir: &str,
    meta: &Metadata,
    ctx: &RequestContext,
) -> Response<Full<Bytes>> {
    let index = path::join(dir, INDEX_PAGE);
    if let Ok(index_meta) = fs.stat(&index) {
        if !index_meta.is_dir() {
            return serve_file(fs, &index, &index_meta, ctx);
        }
    }

    let last_modified = meta.modified.map(cache::format_http_date);
    if cache::not_modified_since(ctx.if_modified_since.as_deref(), meta.modified) {
        return http::build_304_response(None, last_modified.as_deref());
    }

    match fs.read_dir(dir) {
        Ok(entries) => build_html_response(listing::render(&entries), last_modified.as_deref(), ctx.is_head),
        Err(e) => error_response(&e),
    }
}

fn serve_file(
    fs: &dyn FileSystem,
    name: &str,
    meta: &Metadata,
    ctx: &RequestContext,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(meta.size, meta.modified);
    let last_modified = meta.modified.map(cache::format_http_date);

    // If-None-Match takes precedence over If-Modified-Since
    let not_modified = match ctx.if_none_match.as_deref() {
        Some(_) => cache::check_etag_match(ctx.if_none_match.as_deref(), &etag),
        None => cache::not_modified_since(ctx.if_modified_since.as_deref(), meta.modified),
    };
    if not_modified {
        return http::build_304_response(Some(&etag), last_modified.as_deref());
    }

    let known_type = mime::get_content_type(Path::new(name).extension().and_then(|e| e.to_str()));
    let range = http::parse_range_header(ctx.range_header.as_deref(), meta.size);
    if matches!(range, RangeParseResult::NotSatisfiable) {
        return http::build_416_response(meta.size);
    }

    // HEAD with a known type never needs the contents
    let (content_type, mut file) = match known_type {
        Some(content_type) if ctx.is_head => (content_type, None),
        Some(content_type) => match fs.open(name) {
            Ok(file) => (content_type, Some(file)),
            Err(e) => return error_response(&e),
        },
        None => {
            let mut file = match fs.open(name) {
                Ok(file) => file,
                Err(e) => return error_response(&e),
            };
            match sniff(&mut file) {
                Ok(content_type) => (content_type, Some(file)),
                Err(e) => return error_response(&VfsError::Io(e)),
            }
        }
    };

    let headers = FileHeaders {
        content_type,
        etag: &etag,
        last_modified,
    };
    let size = meta.size;
    let file = if ctx.is_head { None } else { file.as_mut() };

    match range {
        RangeParseResult::Valid(range) => match read_body(file, range.start, range.len()) {
            Ok(body) => build_partial_response(body, range, size, &headers),
            Err(e) => error_response(&VfsError::Io(e)),
        },
        RangeParseResult::NotSatisfiable => http::build_416_response(size),
        RangeParseResult::None => match read_body(file, 0, size) {
            Ok(body) => build_file_response(body, size, &headers),
            Err(e) => error_response(&VfsError::Io(e)),
        },
    }
}

/// Detect content type from the leading bytes, leaving the file rewound
fn sniff(file: &mut VfsFile) -> io::Result<&'static str> {
    let mut head = Vec::with_capacity(mime::SNIFF_LEN);
    file.by_ref()
        .take(mime::SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(mime::sniff_content_type(&head))
}

/// Read `len` bytes from `start`; no file means an empty body
fn read_body(file: Option<&mut VfsFile>, start: u64, len: u64) -> io::Result<Bytes> {
    let Some(file) = file else {
        return Ok(Bytes::new());
    };
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.by_ref().take(len).read_to_end(&mut buf)?;
    Ok(Bytes::from(buf))
}

/// 301 to a location relative to the request, keeping the query string
fn local_redirect(ctx: &RequestContext, target: &str) -> Response<Full<Bytes>> {
    match &ctx.query {
        Some(query) => http::build_moved_response(&format!("{target}?{query}")),
        None => http::build_moved_response(target),
    }
}

fn error_response(err: &VfsError) -> Response<Full<Bytes>> {
    match err {
        VfsError::NotFound(_) | VfsError::NotADirectory(_) | VfsError::IsADirectory(_) => {
            http::build_404_response()
        }
        VfsError::PermissionDenied(path) => {
            logger::log_warning(&format!("Permission denied: {path}"));
            http::build_403_response()
        }
        VfsError::Io(_) | VfsError::Other(_) => {
            logger::log_error(&format!("Failed to serve file: {err}"));
            http::build_500_response()
        }
    }
}
