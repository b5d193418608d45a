//! Open tabs and the active context
//!
//! The tab list is an ordered set of contexts; at most one of them is active.
//! Activation here only moves the pointer. The full activation protocol
//! (unread reset and view rebuild) is coordinated by the engine.

use tracing::debug;

use crate::types::ContextId;
use crate::unread::UnreadTracker;

/// One open conversation in the tab strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub context: ContextId,
    pub label: String,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    tabs: Vec<Tab>,
    active: Option<usize>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a tab. Returns `false` if the context was already open.
    pub fn open(&mut self, context: ContextId, label: impl Into<String>) -> bool {
        if self.is_open(&context) {
            return false;
        }
        debug!("Opening tab {}", context);
        self.tabs.push(Tab {
            context,
            label: label.into(),
        });
        true
    }

    /// Close a tab. Closing the active tab leaves no active context.
    pub fn close(&mut self, context: &ContextId) -> bool {
        let Some(pos) = self.position(context) else {
            return false;
        };
        debug!("Closing tab {}", context);
        self.tabs.remove(pos);
        self.active = match self.active {
            Some(active) if active == pos => None,
            Some(active) if active > pos => Some(active - 1),
            other => other,
        };
        true
    }

    /// Point the active marker at an already-open tab
    pub fn set_active(&mut self, context: &ContextId) -> bool {
        match self.position(context) {
            Some(pos) => {
                self.active = Some(pos);
                true
            }
            None => false,
        }
    }

    /// Open the context if needed, then make it active
    pub fn activate(&mut self, context: &ContextId, label: impl Into<String>) {
        self.open(context.clone(), label);
        self.set_active(context);
    }

    /// Tab after the active one, wrapping. Without an active tab, the first.
    pub fn next(&self) -> Option<ContextId> {
        if self.tabs.is_empty() {
            return None;
        }
        let pos = match self.active {
            Some(active) => (active + 1) % self.tabs.len(),
            None => 0,
        };
        Some(self.tabs[pos].context.clone())
    }

    /// Tab before the active one, wrapping. Without an active tab, the last.
    pub fn previous(&self) -> Option<ContextId> {
        if self.tabs.is_empty() {
            return None;
        }
        let len = self.tabs.len();
        let pos = match self.active {
            Some(active) => (active + len - 1) % len,
            None => len - 1,
        };
        Some(self.tabs[pos].context.clone())
    }

    /// First tab with unread messages after the active one, wrapping once
    pub fn next_with_unread(&self, unread: &UnreadTracker) -> Option<ContextId> {
        let len = self.tabs.len();
        let start = self.active.map_or(0, |active| active + 1);
        (0..len)
            .map(|offset| &self.tabs[(start + offset) % len])
            .find(|tab| unread.has_unread(&tab.context))
            .map(|tab| tab.context.clone())
    }

    pub fn relabel(&mut self, context: &ContextId, label: impl Into<String>) {
        if let Some(pos) = self.position(context) {
            self.tabs[pos].label = label.into();
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active(&self) -> Option<&ContextId> {
        self.active.map(|pos| &self.tabs[pos].context)
    }

    pub fn is_active(&self, context: &ContextId) -> bool {
        self.active() == Some(context)
    }

    pub fn is_open(&self, context: &ContextId) -> bool {
        self.position(context).is_some()
    }

    fn position(&self, context: &ContextId) -> Option<usize> {
        self.tabs.iter().position(|tab| &tab.context == context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_tabs() -> SessionManager {
        let mut session = SessionManager::new();
        session.open(ContextId::Channel(0), "General");
        session.open(ContextId::Channel(1), "Ops");
        session.open(ContextId::contact("abc123"), "Relay");
        session
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut session = SessionManager::new();
        assert!(session.open(ContextId::Channel(0), "General"));
        assert!(!session.open(ContextId::Channel(0), "Renamed"));
        assert_eq!(session.tabs().len(), 1);
        assert_eq!(session.tabs()[0].label, "General");
    }

    #[test]
    fn test_close_unknown_is_noop() {
        let mut session = three_tabs();
        session.set_active(&ContextId::Channel(1));
        assert!(!session.close(&ContextId::Channel(9)));
        assert_eq!(session.tabs().len(), 3);
        assert_eq!(session.active(), Some(&ContextId::Channel(1)));
    }

    #[test]
    fn test_close_active_clears_pointer() {
        let mut session = three_tabs();
        session.set_active(&ContextId::Channel(1));
        assert!(session.close(&ContextId::Channel(1)));
        assert_eq!(session.active(), None);
    }

    #[test]
    fn test_close_before_active_keeps_pointer() {
        let mut session = three_tabs();
        session.set_active(&ContextId::contact("abc123"));
        session.close(&ContextId::Channel(0));
        assert_eq!(session.active(), Some(&ContextId::contact("abc123")));
    }

    #[test]
    fn test_cyclic_traversal() {
        let mut session = three_tabs();
        session.set_active(&ContextId::contact("abc123"));
        assert_eq!(session.next(), Some(ContextId::Channel(0)));
        session.set_active(&ContextId::Channel(0));
        assert_eq!(session.previous(), Some(ContextId::contact("abc123")));
        assert_eq!(SessionManager::new().next(), None);
    }

    #[test]
    fn test_next_with_unread_wraps_once() {
        let mut session = three_tabs();
        let mut unread = UnreadTracker::new();
        session.set_active(&ContextId::Channel(1));
        unread.on_activate(&ContextId::Channel(1));

        assert_eq!(session.next_with_unread(&unread), None);

        unread.on_message(&ContextId::Channel(0));
        assert_eq!(session.next_with_unread(&unread), Some(ContextId::Channel(0)));

        unread.on_message(&ContextId::contact("abc123"));
        assert_eq!(
            session.next_with_unread(&unread),
            Some(ContextId::contact("abc123"))
        );
    }

    #[test]
    fn test_activate_opens_missing_tab() {
        let mut session = SessionManager::new();
        session.activate(&ContextId::Channel(4), "#4");
        assert!(session.is_open(&ContextId::Channel(4)));
        assert!(session.is_active(&ContextId::Channel(4)));
    }
}
