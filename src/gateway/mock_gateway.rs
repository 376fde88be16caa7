//! Route registration for the mock endpoints.

use std::sync::Arc;

use crate::gateway::handlers::{playback, record};
use crate::parser::{HttpRequest, Method};
use crate::server::{HttpServer, MethodFilter};
use crate::store::ResponseQueueStore;

/// Exposes a [`ResponseQueueStore`] over HTTP.
///
/// ```no_run
/// use std::sync::Arc;
/// use queuemock::{HttpServer, MockGateway, ResponseQueueStore, ServerConfig};
///
/// # async fn run() -> Result<(), queuemock::ServerError> {
/// let server = HttpServer::new(ServerConfig::default());
/// let gateway = MockGateway::new(Arc::new(ResponseQueueStore::new()));
/// gateway.register(&server).await;
/// server.start().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockGateway {
    store: Arc<ResponseQueueStore>,
}

impl MockGateway {
    /// Where responses are recorded.
    pub const RECORD_ROUTE: &'static str = "/r/{session}";
    /// Where responses are played back, for any request method. The trailing
    /// path is ignored.
    pub const PLAYBACK_ROUTE: &'static str = "/p/{session}/{*path}";

    /// Create a gateway over the given store.
    pub fn new(store: Arc<ResponseQueueStore>) -> Self {
        Self { store }
    }

    /// The store this gateway reads and writes.
    pub fn store(&self) -> &Arc<ResponseQueueStore> {
        &self.store
    }

    /// Add the record and playback routes to a server.
    pub async fn register(&self, server: &HttpServer) {
        let store = self.store.clone();
        server.add_route(Self::RECORD_ROUTE, vec![Method::POST], move |req| {
            let store = store.clone();
            async move { Ok(record(&store, session(&req), &req.body)) }
        }).await;

        let store = self.store.clone();
        server.add_route(Self::PLAYBACK_ROUTE, MethodFilter::Any, move |req| {
            let store = store.clone();
            async move { Ok(playback(&store, session(&req)).await) }
        }).await;
    }
}

fn session(req: &HttpRequest) -> &str {
    req.get_path_param("session").unwrap_or_default()
}
