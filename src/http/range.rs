//! HTTP Range request parsing module
//!
//! Single `bytes=` ranges per RFC 7233. Multi-range requests are answered
//! with the full body.

/// Inclusive byte range resolved against a known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Satisfiable single range
    Valid(ByteRange),
    /// Range outside the entity - should return 416
    NotSatisfiable,
    /// No Range header or malformed (ignore, return full content)
    None,
}

/// Parse HTTP Range header
///
/// Supported formats:
/// - `bytes=start-end`
/// - `bytes=start-`
/// - `bytes=-suffix`
///
/// # Examples
/// ```
/// use fileserver::http::range::{parse_range_header, ByteRange, RangeParseResult};
///
/// assert_eq!(
///     parse_range_header(Some("bytes=0-99"), 1000),
///     RangeParseResult::Valid(ByteRange { start: 0, end: 99 })
/// );
/// assert_eq!(parse_range_header(None, 1000), RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, size: u64) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };

    if spec.contains(',') {
        return RangeParseResult::None;
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeParseResult::None;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        return parse_suffix(end_str, size);
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeParseResult::None;
    };
    if start >= size {
        return RangeParseResult::NotSatisfiable;
    }

    let end = if end_str.is_empty() {
        size - 1
    } else {
        match end_str.parse::<u64>() {
            Ok(e) if e < start => return RangeParseResult::NotSatisfiable,
            Ok(e) => e.min(size - 1),
            Err(_) => return RangeParseResult::None,
        }
    };

    RangeParseResult::Valid(ByteRange { start, end })
}

/// Parse suffix range (e.g., "-500" for the last 500 bytes)
fn parse_suffix(suffix_str: &str, size: u64) -> RangeParseResult {
    let Ok(suffix) = suffix_str.parse::<u64>() else {
        return RangeParseResult::None;
    };

    if suffix == 0 || size == 0 {
        return RangeParseResult::NotSatisfiable;
    }

    RangeParseResult::Valid(ByteRange {
        start: size.saturating_sub(suffix),
        end: size - 1,
    })
}
