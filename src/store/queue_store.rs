//! The shared session store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::store::queued_response::QueuedResponse;

type SessionQueue = Arc<Mutex<VecDeque<QueuedResponse>>>;

/// Maps session names to FIFO queues of scripted responses.
///
/// The session map sits behind a read-write lock and every queue has its own
/// mutex. Lookups share the map lock, so sessions only contend while a new
/// session is being inserted. Operations on one session are serialized by
/// that session's mutex, which fixes the replay order to the enqueue order.
///
/// A session that was never enqueued to behaves exactly like an empty one.
/// Nothing is ever evicted except by [`dequeue`](Self::dequeue).
#[derive(Debug, Default)]
pub struct ResponseQueueStore {
    sessions: RwLock<HashMap<String, SessionQueue>>,
}

impl ResponseQueueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the tail of a session's queue.
    ///
    /// The queue is created on first use. Returns the queue length after the
    /// append, so the Nth enqueue on a fresh session returns N.
    pub fn enqueue(&self, session: &str, response: QueuedResponse) -> usize {
        let queue = self.queue_or_insert(session);
        let mut queue = lock(&queue);
        queue.push_back(response);
        queue.len()
    }

    /// Remove and return the head of a session's queue.
    ///
    /// Returns `None` when the session is unknown or its queue is empty; the
    /// store is left untouched in that case.
    pub fn dequeue(&self, session: &str) -> Option<QueuedResponse> {
        let queue = self.queue(session)?;
        let mut queue = lock(&queue);
        queue.pop_front()
    }

    /// The number of responses waiting in a session.
    pub fn len(&self, session: &str) -> usize {
        match self.queue(session) {
            Some(queue) => {
                let queue = lock(&queue);
                queue.len()
            }
            None => 0,
        }
    }

    /// Whether a session has nothing waiting.
    pub fn is_empty(&self, session: &str) -> bool {
        self.len(session) == 0
    }

    /// The number of sessions that have been enqueued to at least once.
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn queue(&self, session: &str) -> Option<SessionQueue> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session).cloned()
    }

    fn queue_or_insert(&self, session: &str) -> SessionQueue {
        if let Some(queue) = self.queue(session) {
            return queue;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(session.to_string()).or_default().clone()
    }
}

fn lock(queue: &Mutex<VecDeque<QueuedResponse>>) -> MutexGuard<'_, VecDeque<QueuedResponse>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}
