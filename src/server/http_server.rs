//! HTTP server implementation.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, info, warn, error};

use crate::parser::{Error as ParserError, HttpRequest, Method, find_head_end, parse_request_head};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{HandlerFn, MethodFilter, Route, RoutePattern};
use crate::server::response::{HttpResponse, StatusCode};

/// An HTTP server.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The routes.
    pub routes: Arc<RwLock<Vec<Route>>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a route to the server.
    ///
    /// `pattern` follows the [`RoutePattern`] syntax. Routes are tried in the
    /// order they were added. `methods` is a `Vec<Method>` or
    /// [`MethodFilter::Any`].
    pub async fn add_route<F, Fut>(&self, pattern: &str, methods: impl Into<MethodFilter>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        let handler = Arc::new(move |req: HttpRequest| -> Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>> {
            Box::pin(handler(req))
        });

        let route = Route {
            pattern: RoutePattern::parse(pattern),
            methods: methods.into(),
            handler,
        };

        self.routes.write().await.push(route);
    }

    /// Log the registered endpoints.
    async fn display_server_info(&self) {
        let routes = self.routes.read().await;
        info!("Registered endpoints:");
        for route in routes.iter() {
            info!("  {} {}", route.methods, route.pattern);
        }
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        self.serve(listener, async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
                Err(e) => {
                    // Without a signal handler the server runs until killed
                    error!("Error setting up Ctrl+C handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Serve connections from an already bound listener until `shutdown`
    /// completes.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send,
    {
        self.display_server_info().await;
        info!("Server listening on http://{addr}", addr = listener.local_addr()?);

        // Create a semaphore to limit concurrent connections
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        // Use JoinSet to keep track of all spawned tasks
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                // Reap finished connections so the set does not grow unbounded
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            self.handle_new_connection(socket, addr, semaphore.clone(), &mut tasks).await;
                        }
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        &self,
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) {
        // Try to acquire a permit from the semaphore
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE)
                    .with_content_type("text/plain")
                    .with_body_string("Server is at capacity, please try again later");
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        let routes = self.routes.clone();
        let config = self.config.clone();

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            match Self::handle_connection(&mut socket, routes, &config).await {
                Ok(()) => {}
                Err(Error::IoError(e)) => debug!("Connection from {addr} closed: {e}"),
                Err(e) => warn!("Error handling connection from {addr}: {e}"),
            }
        });
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        // If there's a critical error, signal to break the loop
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        }).await;

        info!("Server shutdown complete");
    }

    /// Read one request from the socket, body included.
    ///
    /// # Returns
    ///
    /// `None` if the peer closed the connection without sending anything.
    async fn read_request(
        socket: &mut (impl AsyncRead + Unpin),
        config: &ServerConfig,
    ) -> Result<Option<HttpRequest>, Error> {
        let mut buf = Vec::new();
        let mut chunk = vec![0; config.read_buffer_size.max(1)];

        let head_end = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            if buf.len() > config.max_request_size {
                return Err(Error::RequestTooLarge(config.max_request_size));
            }

            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                // Peer stopped sending; parse whatever arrived
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let mut request = parse_request_head(&buf[..head_end])?;
        let content_length = request.content_length()?;
        let total = head_end
            .checked_add(content_length)
            .filter(|total| *total <= config.max_request_size)
            .ok_or(Error::RequestTooLarge(config.max_request_size))?;

        while buf.len() < total {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Err(ParserError::IncompleteBody {
                    expected: content_length,
                    actual: buf.len() - head_end,
                }.into());
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        request.body = buf[head_end..total].to_vec();
        Ok(Some(request))
    }

    async fn write_response(
        socket: &mut (impl AsyncWrite + Unpin),
        response: &HttpResponse,
    ) -> Result<(), Error> {
        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        Ok(())
    }

    /// Find the handler for a request.
    ///
    /// On failure, returns the 404 or 405 reply to send. The routes lock is
    /// released before anything is written.
    async fn route_request(
        routes: &RwLock<Vec<Route>>,
        method: &Method,
        path: &str,
    ) -> Result<(HandlerFn, HashMap<String, String>), (HttpResponse, Error)> {
        // Find the routes whose pattern matches, with their captured parameters
        let routes_guard = routes.read().await;
        let matching_routes: Vec<(&Route, HashMap<String, String>)> = routes_guard
            .iter()
            .filter_map(|route| route.pattern.matches(path).map(|params| (route, params)))
            .collect();

        if matching_routes.is_empty() {
            let response = HttpResponse::new(StatusCode::NOT_FOUND)
                .with_content_type("text/plain")
                .with_body_string(format!("Not found: {path}"));
            return Err((response, Error::NotFound(path.to_string())));
        }

        // Find a route that matches the method
        if let Some((route, params)) = matching_routes
            .iter()
            .find(|(route, _)| route.methods.allows(method))
        {
            return Ok((route.handler.clone(), params.clone()));
        }

        let allowed = matching_routes
            .iter()
            .filter_map(|(route, _)| match &route.methods {
                MethodFilter::Only(methods) => Some(methods.iter().map(Method::as_str)),
                MethodFilter::Any => None,
            })
            .flatten()
            .collect::<Vec<&str>>()
            .join(", ");

        let response = HttpResponse::new(StatusCode::METHOD_NOT_ALLOWED)
            .with_header("Allow", allowed.clone())
            .with_content_type("text/plain")
            .with_body_string(format!(
                "Method {method} not allowed for path: {path}. Allowed methods: {allowed}"
            ));
        Err((response, Error::MethodNotAllowed(method.clone(), path.to_string())))
    }

    /// A HEAD request gets the headers of the reply, `Content-Length` included,
    /// but no body.
    fn for_method(response: HttpResponse, is_head: bool) -> HttpResponse {
        if is_head {
            response.without_body()
        } else {
            response
        }
    }

    /// Handle a single connection.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        routes: Arc<RwLock<Vec<Route>>>,
        config: &ServerConfig,
    ) -> Result<(), Error> {
        let mut request = match Self::read_request(socket, config).await {
            Ok(Some(req)) => req,
            Ok(None) => return Ok(()), // Connection closed
            Err(Error::ParseError(e)) => {
                let response = HttpResponse::new(StatusCode::BAD_REQUEST)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Error parsing request: {e}"));
                Self::write_response(socket, &response).await?;
                return Err(Error::ParseError(e));
            }
            Err(Error::RequestTooLarge(limit)) => {
                let response = HttpResponse::new(StatusCode::PAYLOAD_TOO_LARGE)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Request exceeds {limit} bytes"));
                Self::write_response(socket, &response).await?;
                return Err(Error::RequestTooLarge(limit));
            }
            Err(e) => return Err(e),
        };

        debug!("{} {} {}", request.method, request.path, request.version);

        let path = request.route_path().to_string();
        let is_head = request.method == Method::HEAD;

        let routed = Self::route_request(&routes, &request.method, &path).await;
        let (handler, params) = match routed {
            Ok(found) => found,
            Err((response, e)) => {
                Self::write_response(socket, &Self::for_method(response, is_head)).await?;
                return Err(e);
            }
        };

        request.path_params = params;
        let response = match handler(request).await {
            Ok(resp) => resp,
            Err(e) => {
                let response = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Internal server error: {e}"));
                Self::write_response(socket, &Self::for_method(response, is_head)).await?;
                return Err(e);
            }
        };

        Self::write_response(socket, &Self::for_method(response, is_head)).await?;

        Ok(())
    }
}
