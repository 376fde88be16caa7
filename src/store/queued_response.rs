//! The scripted response record.

use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Deserializer, Serialize};

/// A single scripted reply waiting in a session queue.
///
/// The JSON form uses capitalized field names (`Status`, `Headers`, `Body`,
/// `Wait`). Lowercase and uppercase spellings are accepted as well, missing
/// or `null` fields fall back to their defaults and unknown fields are
/// ignored.
///
/// `QueuedResponse::default()` is the empty response handed out when a
/// session has nothing queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedResponse {
    /// The HTTP status code to reply with. Not validated.
    #[serde(rename = "Status", alias = "status", alias = "STATUS", default, deserialize_with = "null_as_default")]
    pub status: i64,
    /// Headers set on the reply, one value per name.
    #[serde(rename = "Headers", alias = "headers", alias = "HEADERS", default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    /// The reply payload, written verbatim.
    #[serde(rename = "Body", alias = "body", alias = "BODY", default, deserialize_with = "null_as_default")]
    pub body: String,
    /// Milliseconds to wait before replying.
    #[serde(rename = "Wait", alias = "wait", alias = "WAIT", default, deserialize_with = "null_as_default")]
    pub wait: i64,
}

impl QueuedResponse {
    /// Create a response with the given status and no headers, body or delay.
    pub fn new(status: i64) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the artificial delay in milliseconds.
    pub fn with_wait(mut self, wait: i64) -> Self {
        self.wait = wait;
        self
    }

    /// The delay to apply before replying, if any.
    ///
    /// Zero and negative waits mean no delay.
    pub fn delay(&self) -> Option<Duration> {
        u64::try_from(self.wait)
            .ok()
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

// `null` decodes to the default value instead of failing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
