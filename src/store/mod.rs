//! Session-scoped response queues.
//!
//! This module holds the scripted responses recorded by clients, grouped by
//! session name and replayed in the order they were recorded.

mod queued_response;
mod queue_store;

// Re-export public items
pub use queued_response::QueuedResponse;
pub use queue_store::ResponseQueueStore;
