//! Listener and subscription bookkeeping
//!
//! Plain data structures; the channel manager wraps them in its own locks and
//! always snapshots callbacks before invoking them, so a callback is free to
//! call back into the manager.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback invoked with an inbound payload or event body
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Event type → set of listeners
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, Callback)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener, returning the id needed to remove it
    pub fn insert(&mut self, event_type: &str, callback: Callback) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    /// Remove one listener. Returns false if it was already gone.
    pub fn remove(&mut self, event_type: &str, id: u64) -> bool {
        let Some(entries) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(event_type);
        }
        removed
    }

    /// Listeners for an event type, in registration order
    pub fn snapshot(&self, event_type: &str) -> Vec<Callback> {
        self.listeners
            .get(event_type)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }
}

struct Slot {
    generation: u64,
    callback: Callback,
}

/// Topic → single callback slot
///
/// A second insert for the same topic replaces the first (last writer wins).
/// Each insert gets a fresh generation so that a handle to a replaced slot
/// cannot remove its successor.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_generation: u64,
    slots: HashMap<String, Slot>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback. Returns its generation and whether a previous
    /// callback was replaced.
    pub fn insert(&mut self, topic: &str, callback: Callback) -> (u64, bool) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let replaced = self
            .slots
            .insert(
                topic.to_string(),
                Slot {
                    generation,
                    callback,
                },
            )
            .is_some();
        (generation, replaced)
    }

    /// Remove the slot only if it still holds `generation`
    pub fn remove(&mut self, topic: &str, generation: u64) -> bool {
        match self.slots.get(topic) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(topic);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, topic: &str) -> Option<Callback> {
        self.slots.get(topic).map(|slot| Arc::clone(&slot.callback))
    }

    /// Active topics, sorted for a stable replay order
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.slots.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Run a callback, containing any panic it raises
///
/// Returns false if the callback panicked. The panic is reported through
/// tracing and never reaches the caller.
pub fn invoke_isolated(callback: &Callback, payload: &Value, context: &str) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(listener = %context, reason = %reason, "Realtime callback panicked");
            false
        }
    }
}
