//! Append-only per-context message history

use std::collections::HashMap;

use crate::types::{ContextId, Message};

/// Ordered message sequences keyed by context.
///
/// Insertion order is arrival order; timestamps are never used to reorder.
/// Nothing is deduplicated: a message delivered twice is stored twice.
#[derive(Debug, Default)]
pub struct HistoryStore {
    conversations: HashMap<ContextId, Vec<Message>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the history of its own context
    pub fn append(&mut self, message: Message) {
        self.conversations
            .entry(message.context.clone())
            .or_default()
            .push(message);
    }

    /// Full retained sequence for a context, oldest first.
    ///
    /// The iterator is cheap to clone, so callers can walk it more than once.
    pub fn get(&self, context: &ContextId) -> impl Iterator<Item = &Message> + Clone + '_ {
        self.conversations
            .get(context)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
    }

    pub fn len(&self, context: &ContextId) -> usize {
        self.conversations.get(context).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, context: &ContextId) -> bool {
        self.len(context) == 0
    }

    pub fn total_messages(&self) -> usize {
        self.conversations.values().map(Vec::len).sum()
    }
}
