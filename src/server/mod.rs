//! HTTP server implementation for queuemock.
//!
//! This module provides a small HTTP/1.1 server with pattern routing and
//! async handlers. Each connection serves a single request.

mod response;
mod config;
mod error;
mod handler;
mod http_server;
mod tests;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::Error;
pub use handler::{HandlerFn, HandlerFuture, MethodFilter, Route, RoutePattern};
pub use http_server::HttpServer;
