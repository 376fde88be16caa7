//! Error types for the HTTP parser.

use thiserror::Error;

/// Errors that can occur during HTTP request parsing.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method in the request is not supported.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request path is invalid or missing.
    #[error("Invalid HTTP path")]
    InvalidPath,

    /// The request line is malformed (wrong format or missing components).
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version in the request is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header in the request has an invalid format.
    #[error("Invalid header format")]
    InvalidHeaderFormat,

    /// The Content-Length header is not a valid byte count.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The request uses a transfer encoding the parser cannot decode.
    #[error("Unsupported Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// The request ended before the declared body length was read.
    #[error("Incomplete body: expected {expected} bytes, got {actual}")]
    IncompleteBody { expected: usize, actual: usize },

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,
}
