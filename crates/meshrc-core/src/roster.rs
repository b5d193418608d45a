//! Channel and contact list view model

use std::collections::BTreeSet;

use crate::types::{Channel, Contact, ContextId, KeyPrefix};
use crate::unread::UnreadTracker;

/// One row of the sidebar list. `badge` is read from the unread tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub context: ContextId,
    pub label: String,
    pub badge: u32,
    pub favorite: bool,
}

/// View-level copy of the device directories plus local favorites and search
#[derive(Debug, Default)]
pub struct Roster {
    channels: Vec<Channel>,
    contacts: Vec<Contact>,
    favorites: BTreeSet<KeyPrefix>,
    search: String,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_favorites<I>(favorites: I) -> Self
    where
        I: IntoIterator<Item = KeyPrefix>,
    {
        Self {
            favorites: favorites.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn set_channels(&mut self, mut channels: Vec<Channel>) {
        channels.sort_by_key(|channel| channel.index);
        self.channels = channels;
    }

    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Star or unstar a contact. Channels cannot be favorites.
    pub fn toggle_favorite(&mut self, context: &ContextId) -> Option<bool> {
        let prefix = context.as_contact()?;
        if self.favorites.remove(prefix) {
            Some(false)
        } else {
            self.favorites.insert(prefix.clone());
            Some(true)
        }
    }

    pub fn is_favorite(&self, context: &ContextId) -> bool {
        context
            .as_contact()
            .is_some_and(|prefix| self.favorites.contains(prefix))
    }

    pub fn channel(&self, idx: u32) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.index == idx)
    }

    /// First slot below `limit` with no named channel
    pub fn free_channel_slot(&self, limit: u32) -> Option<u32> {
        (0..limit).find(|idx| {
            self.channel(*idx)
                .map_or(true, |channel| channel.name.is_empty())
        })
    }

    pub fn contact(&self, prefix: &KeyPrefix) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|contact| &contact.key_prefix() == prefix)
    }

    /// Current display label for a context, with id-based fallbacks
    pub fn label_for(&self, context: &ContextId) -> String {
        let label = match context {
            ContextId::Channel(idx) => self
                .channel(*idx)
                .map(|channel| channel.name.clone())
                .filter(|name| !name.is_empty()),
            ContextId::Contact(prefix) => self.contact(prefix).map(Contact::display_name),
        };
        label.unwrap_or_else(|| context.fallback_label())
    }

    /// Channels by index, then matching contacts with favorites first
    pub fn entries(&self, unread: &UnreadTracker) -> Vec<RosterEntry> {
        let channels = self
            .channels
            .iter()
            .filter(|channel| !channel.name.is_empty())
            .map(|channel| {
                let context = ContextId::Channel(channel.index);
                RosterEntry {
                    badge: unread.count(&context),
                    label: channel.name.clone(),
                    favorite: false,
                    context,
                }
            });

        let query = self.search.trim().to_lowercase();
        let mut contacts: Vec<RosterEntry> = self
            .contacts
            .iter()
            .map(|contact| (contact, contact.display_name()))
            .filter(|(_, name)| query.is_empty() || name.to_lowercase().contains(&query))
            .map(|(contact, label)| {
                let context = ContextId::Contact(contact.key_prefix());
                RosterEntry {
                    badge: unread.count(&context),
                    favorite: self.is_favorite(&context),
                    label,
                    context,
                }
            })
            .collect();
        contacts.sort_by_cached_key(|entry| (!entry.favorite, entry.label.to_lowercase()));

        channels.chain(contacts).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.set_channels(vec![
            Channel::new(2, "Ops"),
            Channel::new(1, ""),
            Channel::new(0, "General"),
        ]);
        roster.set_contacts(vec![
            Contact::new("cc0000000000", "charlie"),
            Contact::new("aa0000000000", "Alice"),
            Contact::new("bb0000000000", "bob"),
        ]);
        roster
    }

    fn labels(entries: &[RosterEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn test_ordering_and_empty_channels() {
        let entries = roster().entries(&UnreadTracker::new());
        assert_eq!(
            labels(&entries),
            vec!["General", "Ops", "Alice", "bob", "charlie"]
        );
    }

    #[test]
    fn test_favorites_first() {
        let mut roster = roster();
        let charlie = ContextId::contact("cc0000000000");
        assert_eq!(roster.toggle_favorite(&charlie), Some(true));
        assert_eq!(roster.toggle_favorite(&ContextId::Channel(0)), None);

        let entries = roster.entries(&UnreadTracker::new());
        assert_eq!(labels(&entries)[2], "charlie");
        assert!(entries[2].favorite);

        assert_eq!(roster.toggle_favorite(&charlie), Some(false));
        assert!(!roster.is_favorite(&charlie));
    }

    #[test]
    fn test_search_filters_contacts_only() {
        let mut roster = roster();
        roster.set_search("AL");
        let entries = roster.entries(&UnreadTracker::new());
        assert_eq!(labels(&entries), vec!["General", "Ops", "Alice"]);
    }

    #[test]
    fn test_badges_follow_unread() {
        let mut unread = UnreadTracker::new();
        unread.on_message(&ContextId::Channel(2));
        unread.on_message(&ContextId::contact("bb0000000000"));
        let entries = roster().entries(&unread);
        let badge = |label: &str| entries.iter().find(|e| e.label == label).map(|e| e.badge);
        assert_eq!(badge("Ops"), Some(1));
        assert_eq!(badge("bob"), Some(1));
        assert_eq!(badge("General"), Some(0));
    }

    #[test]
    fn test_label_fallbacks() {
        let roster = roster();
        assert_eq!(roster.label_for(&ContextId::Channel(0)), "General");
        assert_eq!(roster.label_for(&ContextId::Channel(1)), "#1");
        assert_eq!(roster.label_for(&ContextId::contact("ffeeddccbbaa")), "ffeeddcc");
        assert_eq!(roster.label_for(&ContextId::contact("AA0000000000")), "Alice");
    }

    #[test]
    fn test_free_channel_slot_reuses_cleared_slots() {
        let mut roster = roster();
        assert_eq!(roster.free_channel_slot(8), Some(1));
        roster.set_channels(vec![Channel::new(0, "General"), Channel::new(1, "Ops")]);
        assert_eq!(roster.free_channel_slot(8), Some(2));
        assert_eq!(roster.free_channel_slot(2), None);
    }
}
