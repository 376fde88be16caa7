//! HTTP parser module.
//!
//! This module turns the raw bytes of an HTTP/1.x request into an
//! [`HttpRequest`], including its body when a `Content-Length` is given.

mod request;
mod method;
mod version;
mod error;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

// Re-export the parsing functions
pub use request::{find_head_end, parse_request, parse_request_head};
