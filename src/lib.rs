//! An HTTP mock server that replays scripted responses.
//!
//! Test harnesses record canned responses against a named session and the
//! server hands them back, oldest first, to whatever asks for that session.
//! This lets a test script the behavior of a third-party HTTP service
//! without running one.
//!
//! # Endpoints
//!
//! - `POST /r/{session}` takes a JSON body such as
//!   `{"Status":201,"Headers":{"X-Id":"1"},"Body":"created","Wait":50}`,
//!   appends it to the session's queue and replies
//!   `"<N> responses in session"`. A body that is not valid JSON gets a 400
//!   reply and nothing is queued.
//! - `/p/{session}/{path...}`, with any method and any trailing path, removes
//!   the oldest queued response, waits `Wait` milliseconds and replies with
//!   the recorded status, headers and body. An empty session gets an
//!   immediate `204 No Content`.
//!
//! # Using the store directly
//!
//! ```
//! use queuemock::{QueuedResponse, ResponseQueueStore};
//!
//! let store = ResponseQueueStore::new();
//! assert_eq!(store.enqueue("orders", QueuedResponse::new(201).with_body("created")), 1);
//! assert_eq!(store.enqueue("orders", QueuedResponse::new(500)), 2);
//!
//! assert_eq!(store.dequeue("orders").unwrap().status, 201);
//! assert_eq!(store.dequeue("orders").unwrap().status, 500);
//! assert_eq!(store.dequeue("orders"), None);
//! ```

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Export the store module
pub mod store;

// Export the gateway module
pub mod gateway;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{Error as ServerError, HttpResponse, HttpServer, ServerConfig, StatusCode};
pub use store::{QueuedResponse, ResponseQueueStore};
pub use gateway::{MockGateway, RecordError};
