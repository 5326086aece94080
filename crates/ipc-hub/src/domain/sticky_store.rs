//! # Sticky Store
//!
//! Retains the latest message per sticky topic so it can be replayed to
//! peers that join later.
//!
//! ## Ordering
//!
//! Snapshots are returned in insertion order. Overwriting a topic keeps its
//! position; clearing a topic and writing it again moves it to the end.
//! Replay order is therefore deterministic.
//!
//! ## Tombstones
//!
//! A tombstone never lands in the store: writing one clears the topic.

use indexmap::IndexMap;
use serde_json::Value;
use shared_types::Payload;

/// Topic → last retained message, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StickyStore {
    entries: IndexMap<String, Value>,
}

impl StickyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the retained message for `topic`.
    pub fn put(&mut self, topic: &str, message: Value) {
        match self.entries.get_mut(topic) {
            Some(slot) => *slot = message,
            None => {
                self.entries.insert(topic.to_string(), message);
            }
        }
    }

    /// Remove the retained message for `topic`. Returns the removed value.
    pub fn clear(&mut self, topic: &str) -> Option<Value> {
        self.entries.shift_remove(topic)
    }

    /// Apply a sticky write: a value is stored, a tombstone clears the topic.
    pub fn apply(&mut self, topic: &str, payload: &Payload) {
        match payload {
            Payload::Value(message) => self.put(topic, message.clone()),
            Payload::Tombstone => {
                self.clear(topic);
            }
        }
    }

    #[must_use]
    pub fn get(&self, topic: &str) -> Option<&Value> {
        self.entries.get(topic)
    }

    /// All retained entries, oldest topic first.
    #[must_use]
    pub fn snapshot_in_order(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|(topic, message)| (topic.clone(), message.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
