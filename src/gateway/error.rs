//! Error types for the record endpoint.

use thiserror::Error;

/// Reasons a record payload could not be decoded.
///
/// The message is what follows `Bad Request: ` in the reply.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The request had no payload at all.
    #[error("EOF")]
    EmptyPayload,

    /// The payload is not a valid response record.
    #[error("{0}")]
    InvalidJson(#[from] serde_json::Error),
}
