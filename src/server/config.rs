//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

/// The port the server listens on when none is given.
pub const DEFAULT_PORT: u16 = 8080;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The size of each socket read.
    pub read_buffer_size: usize,
    /// The largest request, head and body together, the server will accept.
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_request_size: 1024 * 1024,
        }
    }
}
