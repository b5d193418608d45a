//! Per-context unread counters
//!
//! Badges everywhere in the UI are a pure read of [`UnreadTracker::count`];
//! nothing else stores an unread value.

use std::collections::HashMap;

use crate::types::ContextId;

#[derive(Debug, Default)]
pub struct UnreadTracker {
    counts: HashMap<ContextId, u32>,
    active: Option<ContextId>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one inbound message. The active context never accrues unread.
    pub fn on_message(&mut self, context: &ContextId) {
        if self.active.as_ref() == Some(context) {
            return;
        }
        *self.counts.entry(context.clone()).or_insert(0) += 1;
    }

    /// Mark a context active and clear its count. Idempotent.
    pub fn on_activate(&mut self, context: &ContextId) {
        self.counts.remove(context);
        self.active = Some(context.clone());
    }

    /// Forget the active context, e.g. after its tab was closed
    pub fn on_deactivate(&mut self) {
        self.active = None;
    }

    pub fn count(&self, context: &ContextId) -> u32 {
        self.counts.get(context).copied().unwrap_or(0)
    }

    pub fn has_unread(&self, context: &ContextId) -> bool {
        self.count(context) > 0
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn active(&self) -> Option<&ContextId> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_context_accrues() {
        let mut tracker = UnreadTracker::new();
        let chan = ContextId::Channel(0);
        tracker.on_activate(&ContextId::contact("abc123"));
        tracker.on_message(&chan);
        tracker.on_message(&chan);
        assert_eq!(tracker.count(&chan), 2);
        assert_eq!(tracker.total(), 2);
    }

    #[test]
    fn test_active_context_stays_at_zero() {
        let mut tracker = UnreadTracker::new();
        let chan = ContextId::Channel(0);
        tracker.on_message(&chan);
        tracker.on_activate(&chan);
        assert_eq!(tracker.count(&chan), 0);
        tracker.on_message(&chan);
        assert_eq!(tracker.count(&chan), 0);
        tracker.on_activate(&chan);
        assert_eq!(tracker.count(&chan), 0);
    }

    #[test]
    fn test_deactivate_resumes_counting() {
        let mut tracker = UnreadTracker::new();
        let chan = ContextId::Channel(2);
        tracker.on_activate(&chan);
        tracker.on_deactivate();
        tracker.on_message(&chan);
        assert!(tracker.has_unread(&chan));
        assert_eq!(tracker.active(), None);
    }
}
