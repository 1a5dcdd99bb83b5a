//! Dispatch table for inbound telemetry and companion traffic.
//!
//! Callbacks are closures carrying their own captured state; there is no
//! opaque user-data pointer. Dispatch runs synchronously on the receiver
//! task, in registration order per key. A long-running callback stalls
//! further dispatch for every key; that contract is documented here, not
//! enforced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::types::{BroadcastFrame, Topic, TopicValue};

/// Dispatch key: a single topic or a traffic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    /// One decoded sample of this topic, from broadcast telemetry.
    Topic(Topic),
    /// Every complete broadcast frame.
    Broadcast,
    /// Blobs from the mobile companion client.
    FromMobile,
    /// Blobs from the payload companion client.
    FromPayload,
}

/// Payload handed to a callback.
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    Telemetry(TopicValue),
    Broadcast(Arc<BroadcastFrame>),
    Mobile(Bytes),
    Payload(Bytes),
}

/// A registered handler.
pub type Callback = Arc<dyn Fn(&CallbackEvent) + Send + Sync>;

/// Table of (key, ordered callbacks), driven by the receiver task.
#[derive(Default)]
pub struct CallbackRegistry {
    bindings: Mutex<HashMap<CallbackKey, Vec<Callback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `key`. Multiple bindings per key are allowed;
    /// insertion order defines dispatch order.
    pub fn subscribe(&self, key: CallbackKey, callback: Callback) {
        self.lock().entry(key).or_default().push(callback);
    }

    /// Remove every binding for `key`. No-op when none exist.
    pub fn unsubscribe(&self, key: CallbackKey) {
        self.lock().remove(&key);
    }

    /// Invoke every binding for `key` in insertion order, synchronously on
    /// the calling thread.
    pub fn dispatch(&self, key: CallbackKey, event: &CallbackEvent) {
        // Clone the binding list out of the lock so a callback can
        // re-register without deadlocking.
        let callbacks = match self.lock().get(&key) {
            Some(list) => list.clone(),
            None => return,
        };
        for callback in &callbacks {
            callback(event);
        }
    }

    /// Number of bindings currently registered for `key`.
    pub fn binding_count(&self, key: CallbackKey) -> usize {
        self.lock().get(&key).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallbackKey, Vec<Callback>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry").field("keys", &self.lock().len()).finish()
    }
}
