//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{oneshot, RwLock};

    use crate::parser::Method;
    use crate::server::{HttpServer, ServerConfig, HttpResponse, MethodFilter, Route, RoutePattern, StatusCode, Error, DEFAULT_PORT};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
        max_read: usize,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
                max_read: usize::MAX,
            }
        }

        // Deliver the request a few bytes at a time, like a slow client
        fn trickling(read_data: Vec<u8>, max_read: usize) -> Self {
            Self {
                max_read,
                ..Self::new(read_data)
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let unfilled = buf.initialize_unfilled();
            let limit = unfilled.len().min(this.max_read);
            let n = std::io::Read::read(&mut this.read_data, &mut unfilled[..limit])?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    // Records whether the routes lock was held while the reply was written
    struct LockCheckingStream {
        inner: MockTcpStream,
        routes: Arc<RwLock<Vec<Route>>>,
        locked_during_write: bool,
    }

    impl AsyncRead for LockCheckingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for LockCheckingStream {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.routes.try_write().is_err() {
                this.locked_during_write = true;
            }
            Pin::new(&mut this.inner).poll_write(cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
        }
    }

    async fn server_with_echo_route() -> HttpServer {
        let server = HttpServer::new(ServerConfig::default());
        server.add_route("/echo/{name}/{*rest}", vec![Method::GET, Method::POST], |req| async move {
            let body = format!(
                "name={} rest={} body={}",
                req.get_path_param("name").unwrap_or_default(),
                req.get_path_param("rest").unwrap_or_default(),
                String::from_utf8_lossy(&req.body),
            );
            Ok(HttpResponse::new(StatusCode::OK)
                .with_content_type("text/plain")
                .with_body_string(body))
        }).await;
        server
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert_eq!(DEFAULT_PORT, 8080);
        assert!(config.addr.ip().is_unspecified());
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.max_request_size, 1024 * 1024);
    }

    #[test]
    fn test_route_pattern_literal() {
        let pattern = RoutePattern::parse("/health");
        assert!(pattern.matches("/health").is_some());
        assert!(pattern.matches("/health/").is_none());
        assert!(pattern.matches("/healthz").is_none());
        assert!(pattern.matches("/").is_none());
    }

    #[test]
    fn test_route_pattern_param() {
        let pattern = RoutePattern::parse("/r/{session}");

        let params = pattern.matches("/r/orders").unwrap();
        assert_eq!(params.get("session").unwrap(), "orders");

        assert!(pattern.matches("/r/").is_none());
        assert!(pattern.matches("/r").is_none());
        assert!(pattern.matches("/r/orders/more").is_none());
    }

    #[test]
    fn test_route_pattern_catch_all() {
        let pattern = RoutePattern::parse("/p/{session}/{*path}");

        let params = pattern.matches("/p/orders/v1/items/7").unwrap();
        assert_eq!(params.get("session").unwrap(), "orders");
        assert_eq!(params.get("path").unwrap(), "v1/items/7");

        let params = pattern.matches("/p/orders/").unwrap();
        assert_eq!(params.get("path").unwrap(), "");

        assert!(pattern.matches("/p/orders").is_none());
        assert!(pattern.matches("/p//x").is_none());
    }

    #[test]
    fn test_route_pattern_decodes_params() {
        let pattern = RoutePattern::parse("/r/{session}");
        let params = pattern.matches("/r/my%20session").unwrap();
        assert_eq!(params.get("session").unwrap(), "my session");

        // An encoded slash separates segments like a literal one
        assert!(pattern.matches("/r/a%2Fb").is_none());
        let catch_all = RoutePattern::parse("/p/{session}/{*path}");
        let params = catch_all.matches("/p/a%2Fb").unwrap();
        assert_eq!(params.get("session").unwrap(), "a");
        assert_eq!(params.get("path").unwrap(), "b");

        // Undecodable sequences are kept as sent
        let params = pattern.matches("/r/bad%FF").unwrap();
        assert_eq!(params.get("session").unwrap(), "bad%FF");
    }

    #[test]
    fn test_status_code_range() {
        assert_eq!(StatusCode::from_code(201), Some(StatusCode::CREATED));
        assert_eq!(StatusCode::from_code(299).map(|s| s.as_u16()), Some(299));
        assert_eq!(StatusCode::from_code(0), None);
        assert_eq!(StatusCode::from_code(-200), None);
        assert_eq!(StatusCode::from_code(99), None);
        assert_eq!(StatusCode::from_code(100), None);
        assert_eq!(StatusCode::from_code(101), None);
        assert_eq!(StatusCode::from_code(199), None);
        assert_eq!(StatusCode::from_code(200), Some(StatusCode::OK));
        assert_eq!(StatusCode::from_code(1000), None);
        assert_eq!(StatusCode::from_code(i64::MAX), None);
    }

    #[test]
    fn test_response_serialization() {
        let response = HttpResponse::new(StatusCode::CREATED)
            .with_header("X-Id", "1")
            .with_body_string("created");
        let bytes = String::from_utf8(response.to_bytes()).unwrap();

        assert!(bytes.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(bytes.contains("X-Id: 1\r\n"));
        assert!(bytes.contains("Content-Length: 7\r\n"));
        assert!(bytes.contains("Connection: close\r\n"));
        assert!(bytes.ends_with("\r\n\r\ncreated"));
    }

    #[test]
    fn test_response_unknown_status_has_empty_reason() {
        let response = HttpResponse::new(StatusCode::from_code(599).unwrap());
        let bytes = String::from_utf8(response.to_bytes()).unwrap();
        assert!(bytes.starts_with("HTTP/1.1 599 \r\n"));
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let response = HttpResponse::new(StatusCode::OK)
            .with_header("content-type", "text/html")
            .with_content_type("application/json");

        assert_eq!(response.get_header("Content-Type").unwrap(), "application/json");
        let count = response.headers.keys().filter(|k| k.eq_ignore_ascii_case("content-type")).count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_add_route() {
        let server = HttpServer::new(ServerConfig::default());

        server.add_route("/test/{id}", vec![Method::GET], |_req| async {
            Ok(HttpResponse::new(StatusCode::OK))
        }).await;

        let routes = server.routes.read().await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pattern.to_string(), "/test/{id}");
        assert_eq!(routes[0].methods, MethodFilter::Only(vec![Method::GET]));
        assert_eq!(routes[0].methods.to_string(), "GET");
    }

    #[tokio::test]
    async fn test_handle_connection_passes_params_and_body() {
        let request = b"POST /echo/alice/a/b?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(result.is_ok());

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("name=alice rest=a/b body=hello"));
    }

    #[tokio::test]
    async fn test_handle_connection_reads_body_across_reads() {
        let request = b"POST /echo/bob/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nhello world";
        let mut stream = MockTcpStream::trickling(request.to_vec(), 7);
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(result.is_ok());

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.ends_with("name=bob rest= body=hello world"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_not_found() {
        let request = b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::NotFound(ref p)) if p == "/nonexistent"));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("Not found: /nonexistent"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_method_not_allowed() {
        let request = b"DELETE /echo/alice/x HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::MethodNotAllowed(Method::DELETE, _))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("Allow: GET, POST\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_rejects_extension_method_on_listed_route() {
        let request = b"PURGE /echo/alice/x HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::MethodNotAllowed(Method::Other(ref m), _)) if m == "PURGE"));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("Method PURGE not allowed"));
    }

    #[tokio::test]
    async fn test_handle_connection_any_method_route() {
        let server = HttpServer::new(ServerConfig::default());
        server.add_route("/any/{*rest}", MethodFilter::Any, |req| async move {
            Ok(HttpResponse::new(StatusCode::OK).with_body_string(req.method.to_string()))
        }).await;

        for method in ["GET", "DELETE", "PURGE", "PROPFIND", "get"] {
            let request = format!("{method} /any/x HTTP/1.1\r\nHost: localhost\r\n\r\n");
            let mut stream = MockTcpStream::new(request.into_bytes());

            let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
            assert!(result.is_ok(), "{method} was rejected");

            let response = String::from_utf8_lossy(stream.written_data());
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.ends_with(method));
        }
    }

    #[tokio::test]
    async fn test_handle_connection_head_omits_body() {
        let server = HttpServer::new(ServerConfig::default());
        server.add_route("/page", MethodFilter::Any, |_req| async {
            Ok(HttpResponse::new(StatusCode::OK).with_body_string("twelve bytes"))
        }).await;

        let request = b"HEAD /page HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(result.is_ok());

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 12\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
        assert!(!response.contains("twelve bytes"));
    }

    #[tokio::test]
    async fn test_handle_connection_head_not_found_omits_body() {
        let request = b"HEAD /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_error_reply_written_without_routes_lock() {
        let server = server_with_echo_route().await;

        for request in [
            &b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n"[..],
            &b"DELETE /echo/alice/x HTTP/1.1\r\nHost: localhost\r\n\r\n"[..],
        ] {
            let mut stream = LockCheckingStream {
                inner: MockTcpStream::new(request.to_vec()),
                routes: server.routes.clone(),
                locked_during_write: false,
            };

            let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
            assert!(result.is_err());
            assert!(!stream.inner.written_data().is_empty());
            assert!(!stream.locked_during_write);
        }
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let mut stream = MockTcpStream::new(b"INVALID REQUEST".to_vec());
        let server = HttpServer::new(ServerConfig::default());

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::ParseError(_))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Error parsing request:"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_truncated_body() {
        let request = b"POST /echo/a/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 50\r\n\r\nshort";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::ParseError(_))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_oversized_request() {
        let request = b"POST /echo/a/ HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4096\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = server_with_echo_route().await;
        let config = ServerConfig {
            max_request_size: 1024,
            ..ServerConfig::default()
        };

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &config).await;
        assert!(matches!(result, Err(Error::RequestTooLarge(1024))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_handler_error() {
        let request = b"GET /fail HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = MockTcpStream::new(request.to_vec());
        let server = HttpServer::new(ServerConfig::default());
        server.add_route("/fail", vec![Method::GET], |_req| async {
            Err(Error::InternalError("boom".to_string()))
        }).await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(matches!(result, Err(Error::InternalError(_))));

        let response = String::from_utf8_lossy(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(response.contains("boom"));
    }

    #[tokio::test]
    async fn test_handle_connection_closed_without_data() {
        let mut stream = MockTcpStream::new(Vec::new());
        let server = server_with_echo_route().await;

        let result = HttpServer::handle_connection(&mut stream, server.routes.clone(), &server.config).await;
        assert!(result.is_ok());
        assert!(stream.written_data().is_empty());
    }

    #[tokio::test]
    async fn test_serve_over_tcp_and_shutdown() {
        let server = Arc::new(server_with_echo_route().await);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let serving = server.clone();
        let handle = tokio::spawn(async move {
            serving.serve(listener, async {
                let _ = shutdown_rx.await;
            }).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /echo/tcp/x HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("name=tcp rest=x body="));

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connection_limit_response() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        let server = Arc::new(HttpServer::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = server.clone();
        let handle = tokio::spawn(async move {
            serving.serve(listener, std::future::pending()).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.contains("Server is at capacity, please try again later"));

        handle.abort();
    }
}
