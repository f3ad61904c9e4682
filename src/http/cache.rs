//! HTTP cache validators
//!
//! `ETag` and `Last-Modified` are derived from entry metadata so that
//! conditional requests never need the file contents.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generate a quoted `ETag` from size and modification time
pub fn generate_etag(size: u64, modified: Option<SystemTime>) -> String {
    let mut hasher = DefaultHasher::new();
    size.hash(&mut hasher);
    modified.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports single, comma-separated and wildcard values. Weak validators
/// (`W/"..."`) compare equal to their strong form.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            let e = e.trim();
            e == "*" || e.strip_prefix("W/").unwrap_or(e) == etag
        })
    })
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an IMF-fixdate header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether `If-Modified-Since` allows a 304 for an entry modified at `modified`
///
/// HTTP dates have one-second resolution, so sub-second parts are ignored.
pub fn not_modified_since(if_modified_since: Option<&str>, modified: Option<SystemTime>) -> bool {
    let (Some(header), Some(modified)) = (if_modified_since, modified) else {
        return false;
    };
    let Some(since) = parse_http_date(header) else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}
