//! HTTP protocol layer module
//!
//! Protocol helpers that know nothing about aliases or archives: range
//! parsing, cache validators, content types, listings and response builders.

pub mod cache;
pub mod listing;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeParseResult};
pub use response::{
    build_304_response, build_400_response, build_403_response, build_404_response,
    build_405_response, build_416_response, build_500_response, build_moved_response,
    build_options_response, build_redirect_response,
};
