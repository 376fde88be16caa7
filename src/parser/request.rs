//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// The blank line that ends the header block.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target, including any query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The request body
    pub body: Vec<u8>,
    /// Values captured from the route pattern, filled in by the router
    pub path_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Create a new HTTP request with an empty body.
    pub fn new(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        Self {
            method,
            path,
            version,
            headers,
            body: Vec::new(),
            path_params: HashMap::new(),
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, path, version, headers);
        request.body = body;
        request
    }

    /// Get a header value.
    ///
    /// Header names are compared case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                Some(v)
            } else {
                None
            }
        })
    }

    /// The request path without its query string.
    pub fn route_path(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Get a value captured by the route pattern.
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// The declared body length.
    ///
    /// # Returns
    ///
    /// Zero when no Content-Length header is present, or an error when the
    /// body is chunked or the header is not a byte count.
    pub fn content_length(&self) -> Result<usize, Error> {
        if let Some(encoding) = self.get_header("Transfer-Encoding") {
            if !encoding.eq_ignore_ascii_case("identity") {
                return Err(Error::UnsupportedTransferEncoding(encoding.clone()));
            }
        }

        match self.get_header("Content-Length") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidContentLength(value.clone())),
            None => Ok(0),
        }
    }
}

/// Find the end of the header block.
///
/// # Returns
///
/// The offset just past the blank line that ends the headers, or `None` if
/// the input does not contain a complete header block yet.
pub fn find_head_end(input: &[u8]) -> Option<usize> {
    input
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Parse the request line and headers of an HTTP request.
///
/// The returned request has an empty body. Anything after the header block
/// is ignored.
pub fn parse_request_head(input: &[u8]) -> Result<HttpRequest, Error> {
    let head = match find_head_end(input) {
        Some(end) => &input[..end],
        None => input,
    };

    // Convert the head to a string
    let head_str = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };

    // Split the input into lines
    let mut lines = head_str.lines();

    // Parse the request line
    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::EmptyRequest),
    };

    // Split the request line into method, path, and version
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let path = parts[1].to_string();
    if !path.starts_with('/') {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    // Parse the headers
    let mut headers = HashMap::new();
    for line in lines {
        // Empty line indicates the end of headers
        if line.is_empty() {
            break;
        }

        let (name, value) = line.split_once(':').ok_or(Error::InvalidHeaderFormat)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidHeaderFormat);
        }

        headers.insert(name.to_string(), value.trim().to_string());
    }

    if version.requires_host() && !headers.keys().any(|k| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok(HttpRequest::new(method, path, version, headers))
}

/// Parse a complete HTTP request, including its body.
///
/// The body is taken from the bytes after the header block, limited to the
/// declared Content-Length. Fewer bytes than declared is an error.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let mut request = parse_request_head(input)?;
    let body_start = find_head_end(input).unwrap_or(input.len());
    let expected = request.content_length()?;

    let available = &input[body_start..];
    if available.len() < expected {
        return Err(Error::IncompleteBody { expected, actual: available.len() });
    }

    request.body = available[..expected].to_vec();
    Ok(request)
}
