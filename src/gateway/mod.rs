//! The record and playback endpoints.
//!
//! `POST /r/{session}` queues a scripted response for a session and
//! `/p/{session}/{path...}` replays the oldest one, with any method and any
//! trailing path.

mod error;
mod handlers;
mod mock_gateway;

// Re-export public items
pub use error::RecordError;
pub use handlers::{decode_payload, playback, record, to_http_response, EMPTY_STATUS};
pub use mock_gateway::MockGateway;
