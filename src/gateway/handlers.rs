//! Translation between HTTP requests and store operations.

use log::{debug, info, warn};

use crate::gateway::error::RecordError;
use crate::server::{HttpResponse, StatusCode};
use crate::store::{QueuedResponse, ResponseQueueStore};

/// The status sent when a session has nothing queued, or when a recorded
/// status cannot appear on a status line.
pub const EMPTY_STATUS: StatusCode = StatusCode::NO_CONTENT;

/// Headers describing the message framing, which the server computes itself.
const FRAMING_HEADERS: [&str; 2] = ["Content-Length", "Transfer-Encoding"];

/// Decode a record payload.
///
/// Only the first JSON value is read; anything after it is ignored.
pub fn decode_payload(payload: &[u8]) -> Result<QueuedResponse, RecordError> {
    let mut values = serde_json::Deserializer::from_slice(payload).into_iter::<QueuedResponse>();
    match values.next() {
        Some(Ok(response)) => Ok(response),
        Some(Err(e)) => Err(RecordError::InvalidJson(e)),
        None => Err(RecordError::EmptyPayload),
    }
}

/// Queue the response described by `payload` for `session`.
///
/// A payload that cannot be decoded leaves the store untouched and yields a
/// 400 reply.
pub fn record(store: &ResponseQueueStore, session: &str, payload: &[u8]) -> HttpResponse {
    match decode_payload(payload) {
        Ok(response) => {
            let count = store.enqueue(session, response);
            info!("{session} +1 response");

            HttpResponse::new(StatusCode::OK)
                .with_content_type("text/plain; charset=utf-8")
                .with_body_string(format!("{count} responses in session"))
        }
        Err(e) => {
            warn!("error: request for {session} did not contain valid JSON: {e}");

            HttpResponse::new(StatusCode::BAD_REQUEST)
                .with_content_type("text/plain; charset=utf-8")
                .with_body_string(format!("Bad Request: {e}"))
        }
    }
}

/// Replay the oldest queued response for `session`.
///
/// The response is removed from the queue before the recorded delay starts,
/// so a caller that goes away during the delay still consumes it. An empty
/// session replies immediately with the empty response.
pub async fn playback(store: &ResponseQueueStore, session: &str) -> HttpResponse {
    let Some(queued) = store.dequeue(session) else {
        info!("{session} is empty");
        return to_http_response(QueuedResponse::default());
    };

    if let Some(delay) = queued.delay() {
        debug!("{session} waiting {delay:?} before replying");
        tokio::time::sleep(delay).await;
    }

    info!("{session} -1 response");
    to_http_response(queued)
}

/// Build the wire response for a queued record.
pub fn to_http_response(queued: QueuedResponse) -> HttpResponse {
    let status = StatusCode::from_code(queued.status).unwrap_or_else(|| {
        debug!("status {} cannot be sent, replying {EMPTY_STATUS}", queued.status);
        EMPTY_STATUS
    });

    let mut response = HttpResponse::new(status);
    for (name, value) in queued.headers {
        if FRAMING_HEADERS.iter().any(|framing| framing.eq_ignore_ascii_case(&name)) {
            debug!("ignoring recorded {name} header");
            continue;
        }
        if !is_valid_header(&name, &value) {
            warn!("dropping recorded header {name:?} with invalid characters");
            continue;
        }
        response = response.with_header(name, value);
    }

    response.with_body_string(queued.body)
}

fn is_valid_header(name: &str, value: &str) -> bool {
    let name_ok = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_graphic() && b != b':');
    let value_ok = !value.bytes().any(|b| b == b'\r' || b == b'\n');
    name_ok && value_ok
}
