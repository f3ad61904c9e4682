//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the
//! single-alias root redirect, then dispatch to the static responder.

use crate::handler::static_files;
use crate::http::{self, listing};
use crate::logger;
use crate::pathspec::AliasMap;
use crate::vfs::{AliasFs, FileSystem, ZipFs};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::sync::Arc;

/// Request context encapsulating information needed for request processing
///
/// Owned so it can move onto the blocking pool with the request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Path as it appeared on the wire
    pub raw_path: String,
    /// Percent-decoded path
    pub path: String,
    pub query: Option<String>,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub range_header: Option<String>,
}

impl RequestContext {
    /// Extract the parts of `req` the responder needs
    ///
    /// Returns `None` when the path does not decode to valid UTF-8 or
    /// contains a NUL byte.
    pub fn from_request<B>(req: &Request<B>) -> Option<Self> {
        let uri = req.uri();
        let raw_path = uri.path().to_string();
        let path = percent_decode_str(&raw_path).decode_utf8().ok()?;
        if path.contains('\0') {
            return None;
        }

        Some(Self {
            path: path.into_owned(),
            query: uri.query().map(ToString::to_string),
            is_head: req.method() == Method::HEAD,
            if_none_match: header(req, "if-none-match"),
            if_modified_since: header(req, "if-modified-since"),
            range_header: header(req, "range"),
            raw_path,
        })
    }
}

fn header<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Concrete backend behind a [`Handler`]
#[derive(Debug, Clone)]
enum Backend {
    Aliases(Arc<AliasMap>),
    Archive(Arc<ZipFs>),
    #[cfg(test)]
    Custom,
}

/// HTTP handler over one virtual filesystem
///
/// Cloning shares the backend; nothing is mutated after construction.
#[derive(Clone)]
pub struct Handler {
    fs: Arc<dyn FileSystem>,
    backend: Backend,
    debug: bool,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("backend", &self.backend)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Serve the aliased paths in `aliases`
    pub fn aliased(aliases: Arc<AliasMap>, debug: bool) -> Self {
        Self {
            fs: Arc::new(AliasFs::new(Arc::clone(&aliases))),
            backend: Backend::Aliases(aliases),
            debug,
        }
    }

    /// Serve the contents of an opened zip archive
    pub fn archived(fs: ZipFs, debug: bool) -> Self {
        let fs = Arc::new(fs);
        Self {
            fs: Arc::clone(&fs) as Arc<dyn FileSystem>,
            backend: Backend::Archive(fs),
            debug,
        }
    }

    /// Aliases being served, in alias mode
    pub fn aliases(&self) -> Option<&AliasMap> {
        match &self.backend {
            Backend::Aliases(aliases) => Some(aliases),
            _ => None,
        }
    }

    /// Archive being served, in zip mode
    pub fn archive(&self) -> Option<&ZipFs> {
        match &self.backend {
            Backend::Archive(fs) => Some(fs),
            _ => None,
        }
    }

    #[cfg(test)]
    fn over(fs: Arc<dyn FileSystem>, debug: bool) -> Self {
        Self {
            fs,
            backend: Backend::Custom,
            debug,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.fs.name()
    }

    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Produce the response for one request
    ///
    /// Never fails: every error is mapped to a status code.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        if self.debug {
            logger::log_request(req.uri());
        }

        // 1. Check HTTP method
        if let Some(resp) = check_http_method(req.method()) {
            return resp;
        }

        // 2. A lone alias owns the root
        if let Some(resp) = self.lonely_root_redirect(&req) {
            return resp;
        }

        // 3. Decode the path and hand off to the blocking pool
        let Some(ctx) = RequestContext::from_request(&req) else {
            logger::log_warning(&format!("Undecodable request path: {}", req.uri().path()));
            return http::build_400_response();
        };

        let fs = Arc::clone(&self.fs);
        match tokio::task::spawn_blocking(move || static_files::serve(fs.as_ref(), &ctx)).await {
            Ok(resp) => resp,
            Err(e) => {
                logger::log_error(&format!("File serving task failed: {e}"));
                http::build_500_response()
            }
        }
    }

    fn lonely_root_redirect<B>(&self, req: &Request<B>) -> Option<Response<Full<Bytes>>> {
        let uri = req.uri();
        if uri.path() != "/" || uri.query().is_some() {
            return None;
        }
        let alias = self.aliases()?.sole_alias()?;
        Some(http::build_redirect_response(&format!(
            "/{}",
            listing::encode_segment(alias)
        )))
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    handler: Arc<Handler>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(handler.handle(req).await)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{DirEntry, Metadata, VfsError, VfsFile, VfsResult};
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        docs: PathBuf,
        notes: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join("guide")).unwrap();
        fs::write(docs.join("readme.txt"), "hello, world\n").unwrap();
        fs::write(docs.join("guide").join("index.html"), "<h1>guide</h1>").unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "remember").unwrap();
        Fixture {
            _dir: dir,
            docs,
            notes,
        }
    }

    fn handler(entries: &[(&str, &PathBuf)]) -> Handler {
        let map: AliasMap = entries
            .iter()
            .map(|(alias, path)| ((*alias).to_string(), (*path).clone()))
            .collect();
        Handler::aliased(Arc::new(map), false)
    }

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_single_alias_redirects_root() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let resp = h.handle(get("/")).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["Location"], "/docs");

        // a query string disables the redirect
        let resp = h.handle(get("/?sort=name")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_multiple_aliases_list_root() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs), ("notes", &fx.notes)]);

        let resp = h.handle(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("<a href=\"./docs/\">docs/</a>"));
        assert!(html.contains("<a href=\"./notes/\">notes/</a>"));
    }

    #[tokio::test]
    async fn test_serves_file_content() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let resp = h.handle(get("/docs/readme.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "13");
        assert_eq!(resp.headers()["Content-Type"], "text/plain; charset=utf-8");
        assert_eq!(body_of(resp).await, "hello, world\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);
        let resp = h.handle(get("/docs/missing.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = h.handle(get("/elsewhere/readme.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trailing_slash_canonicalization() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let resp = h.handle(get("/docs")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["Location"], "docs/");

        let resp = h.handle(get("/docs/readme.txt/")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["Location"], "../readme.txt");

        let resp = h.handle(get("/docs/guide/index.html")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["Location"], "./");
    }

    #[tokio::test]
    async fn test_directory_index_page() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);
        let resp = h.handle(get("/docs/guide/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, "<h1>guide</h1>");
    }

    #[tokio::test]
    async fn test_file_alias_directory() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs), ("notes", &fx.notes)]);

        let resp = h.handle(get("/notes/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("./notes.txt"));

        let resp = h.handle(get("/notes/notes.txt")).await;
        assert_eq!(body_of(resp).await, "remember");
    }

    #[tokio::test]
    async fn test_head_has_headers_only() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/docs/readme.txt")
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "13");
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_range_request() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);
        let req = Request::builder()
            .uri("/docs/readme.txt")
            .header("Range", "bytes=0-4")
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()["Content-Range"], "bytes 0-4/13");
        assert_eq!(body_of(resp).await, "hello");

        let req = Request::builder()
            .uri("/docs/readme.txt")
            .header("Range", "bytes=100-")
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[tokio::test]
    async fn test_etag_revalidation() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let resp = h.handle(get("/docs/readme.txt")).await;
        let etag = resp.headers()["ETag"].clone();

        let req = Request::builder()
            .uri("/docs/readme.txt")
            .header("If-None-Match", etag)
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_method_checks() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/docs/readme.txt")
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], "GET, HEAD, OPTIONS");

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .body(())
            .unwrap();
        assert_eq!(h.handle(req).await.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_percent_encoded_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a b.txt"), "spaced").unwrap();
        let target = dir.path().to_path_buf();
        let h = handler(&[("files", &target)]);

        let resp = h.handle(get("/files/a%20b.txt")).await;
        assert_eq!(body_of(resp).await, "spaced");

        let resp = h.handle(get("/files/%FF.txt")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = h.handle(get("/files/%00")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_archive_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("docs/readme.txt", options).unwrap();
        writer.write_all(b"zipped").unwrap();
        writer.finish().unwrap();

        let h = Handler::archived(ZipFs::open(&path).unwrap(), false);
        assert_eq!(h.backend_name(), "zip");
        assert!(h.aliases().is_none());
        assert_eq!(h.archive().unwrap().file_count(), 1);

        let resp = h.handle(get("/docs/readme.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, "zipped");

        // one top-level directory is not an alias, so no redirect
        let resp = h.handle(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("./docs/"));
    }

    /// Every entry exists but none may be read
    struct Locked;

    impl FileSystem for Locked {
        fn open(&self, path: &str) -> VfsResult<VfsFile> {
            Err(VfsError::PermissionDenied(path.to_string()))
        }

        fn stat(&self, path: &str) -> VfsResult<Metadata> {
            Err(VfsError::PermissionDenied(path.to_string()))
        }

        fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
            Err(VfsError::PermissionDenied(path.to_string()))
        }

        fn name(&self) -> &'static str {
            "locked"
        }
    }

    /// One 13-byte file whose opens are counted
    #[derive(Default)]
    struct Counting {
        opens: AtomicUsize,
    }

    impl FileSystem for Counting {
        fn open(&self, _path: &str) -> VfsResult<VfsFile> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(std::io::Cursor::new(b"hello, world\n".to_vec())))
        }

        fn stat(&self, path: &str) -> VfsResult<Metadata> {
            match path {
                "/" => Ok(Metadata::directory(None)),
                "/readme.txt" | "/blob" => Ok(Metadata::file(
                    13,
                    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
                )),
                _ => Err(VfsError::not_found(path)),
            }
        }

        fn read_dir(&self, _path: &str) -> VfsResult<Vec<DirEntry>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn head(uri: &str) -> Request<()> {
        Request::builder()
            .method(Method::HEAD)
            .uri(uri)
            .body(())
            .unwrap()
    }

    #[tokio::test]
    async fn test_permission_denied_is_403() {
        let h = Handler::over(Arc::new(Locked), false);
        assert_eq!(h.backend_name(), "locked");
        let resp = h.handle(get("/secret.txt")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = h.handle(get("/private/")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_head_with_known_type_skips_open() {
        let fs = Arc::new(Counting::default());
        let h = Handler::over(Arc::clone(&fs) as Arc<dyn FileSystem>, false);

        let resp = h.handle(head("/readme.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "13");
        assert_eq!(resp.headers()["Content-Type"], "text/plain; charset=utf-8");
        assert!(body_of(resp).await.is_empty());
        assert_eq!(fs.opens.load(Ordering::SeqCst), 0);

        // no extension: the type comes from the contents
        let resp = h.handle(head("/blob")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "13");
        assert_eq!(fs.opens.load(Ordering::SeqCst), 1);

        let resp = h.handle(get("/readme.txt")).await;
        assert_eq!(body_of(resp).await, "hello, world\n");
        assert_eq!(fs.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_debug_handler_still_serves() {
        let h = Handler::over(Arc::new(Counting::default()), true);
        assert!(h.debug());
        let resp = h.handle(get("/readme.txt?from=log")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_if_modified_since_revalidation() {
        let fx = fixture();
        let h = handler(&[("docs", &fx.docs)]);

        let resp = h.handle(get("/docs/readme.txt")).await;
        let last_modified = resp.headers()["Last-Modified"].clone();

        let req = Request::builder()
            .uri("/docs/readme.txt")
            .header("If-Modified-Since", last_modified.clone())
            .body(())
            .unwrap();
        let resp = h.handle(req).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(resp.headers()["Last-Modified"], last_modified);
        assert!(body_of(resp).await.is_empty());

        let req = Request::builder()
            .uri("/docs/readme.txt")
            .header("If-Modified-Since", "Thu, 01 Jan 1970 00:00:00 GMT")
            .body(())
            .unwrap();
        assert_eq!(h.handle(req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_encoded_slash_is_not_a_separator() {
        let fx = fixture();
        fs::create_dir_all(fx.docs.join("my guide")).unwrap();
        let h = handler(&[("docs", &fx.docs)]);

        // decodes to `/docs/readme.txt/`, but the client sent no trailing slash
        let resp = h.handle(get("/docs/readme.txt%2F")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, "hello, world\n");

        // the redirect keeps the encoding the client used
        let resp = h.handle(get("/docs/my%20guide")).await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["Location"], "my%20guide/");
    }

}
