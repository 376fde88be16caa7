//! HTTP request handlers and routing.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::parser::{HttpRequest, Method};
use crate::server::{HttpResponse, Error};

/// Type alias for a boxed future that returns a Result<HttpResponse, Error>.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for a handler function that takes an HttpRequest and returns a HandlerFuture.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A route path pattern.
///
/// Patterns are `/`-separated segments. A `{name}` segment captures one
/// non-empty path segment and a trailing `{*name}` segment captures the
/// rest of the path, which may be empty. Everything else matches literally.
/// The whole path is percent-decoded before it is split, so an encoded `/`
/// separates segments like a literal one.
///
/// ```
/// use queuemock::server::RoutePattern;
///
/// let pattern = RoutePattern::parse("/p/{session}/{*path}");
/// let params = pattern.matches("/p/orders/v1/items").unwrap();
/// assert_eq!(params["session"], "orders");
/// assert_eq!(params["path"], "v1/items");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a route pattern.
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|segment| {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => match name.strip_prefix('*') {
                        Some(rest) => Segment::CatchAll(rest.to_string()),
                        None => Segment::Param(name.to_string()),
                    },
                    None => Segment::Literal(segment.to_string()),
                }
            })
            .collect();

        Self {
            source: pattern.to_string(),
            segments,
        }
    }

    /// Match a request path against this pattern.
    ///
    /// # Returns
    ///
    /// The captured parameters, or `None` if the path does not match.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let decoded = decode(path);
        let mut remaining = decoded.as_str();

        for (index, segment) in self.segments.iter().enumerate() {
            let is_first = index == 0;
            if !is_first {
                remaining = remaining.strip_prefix('/')?;
            }

            if let Segment::CatchAll(name) = segment {
                params.insert(name.clone(), remaining.to_string());
                return Some(params);
            }

            let (current, rest) = remaining.split_once('/').map_or((remaining, ""), |(head, _)| {
                (head, &remaining[head.len()..])
            });

            match segment {
                Segment::Literal(literal) if literal == current => {}
                Segment::Param(name) if !current.is_empty() => {
                    params.insert(name.clone(), current.to_string());
                }
                _ => return None,
            }

            remaining = rest;
        }

        remaining.is_empty().then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
}

/// The request methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Every method, extension methods included.
    Any,
    /// Only the listed methods.
    Only(Vec<Method>),
}

impl MethodFilter {
    /// Whether `method` is accepted.
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(methods) => methods.contains(method),
        }
    }
}

impl From<Vec<Method>> for MethodFilter {
    fn from(methods: Vec<Method>) -> Self {
        MethodFilter::Only(methods)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => f.write_str("*"),
            MethodFilter::Only(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

/// Represents a route in the HTTP server.
pub struct Route {
    /// The path pattern to match.
    pub pattern: RoutePattern,
    /// The HTTP methods to match.
    pub methods: MethodFilter,
    /// The handler function.
    pub handler: HandlerFn,
}
