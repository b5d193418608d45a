//! Context resolution for inbound messages
//!
//! Turns a decoded gateway event into a `(ContextId, Message)` pair. This is
//! the only place a context id is derived from an inbound event, so every
//! store keyed by context sees the same id for the same conversation.
//! Resolution is total: a malformed event is mislabeled rather than dropped.

use tracing::debug;

use crate::gateway::{Directory, InboundEvent, MessagePayload};
use crate::types::{ContextId, Direction, Enrichment, KeyPrefix, Message, MessageKind};

/// Longest in-band sender token accepted by the `"<sender>: <text>"` fallback
pub const MAX_INBAND_SENDER_LEN: usize = 32;

/// Split `"<token>:<rest>"` into a sender and a trimmed text.
///
/// The token is everything before the first colon, trimmed, and must be
/// 1..=32 characters long.
pub fn split_inband_sender(text: &str) -> Option<(String, String)> {
    let (token, rest) = text.split_once(':')?;
    let token = token.trim();
    let len = token.chars().count();
    if len == 0 || len > MAX_INBAND_SENDER_LEN {
        return None;
    }
    Some((token.to_string(), rest.trim().to_string()))
}

/// Stateless resolver; directory lookups go through the passed [`Directory`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextResolver;

impl ContextResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a message event. Non-message events yield `None`.
    pub fn resolve(
        &self,
        event: &InboundEvent,
        directory: &dyn Directory,
    ) -> Option<(ContextId, Message)> {
        match event {
            InboundEvent::ChannelMessage {
                channel_idx,
                payload,
            } => Some(self.resolve_channel(*channel_idx, payload, directory)),
            InboundEvent::ContactMessage {
                pubkey_prefix,
                payload,
            } => Some(self.resolve_contact(pubkey_prefix.as_ref(), payload, directory)),
            InboundEvent::ContactListUpdated(_)
            | InboundEvent::ChannelListUpdated(_)
            | InboundEvent::Connected
            | InboundEvent::Disconnected { .. } => None,
        }
    }

    pub fn resolve_channel(
        &self,
        channel_idx: u32,
        payload: &MessagePayload,
        directory: &dyn Directory,
    ) -> (ContextId, Message) {
        let context = ContextId::Channel(channel_idx);
        let channel_name = directory.channel_name(channel_idx);

        let explicit = payload
            .sender
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| channel_name.clone());

        let (display_sender, text) = match explicit {
            Some(sender) => (Some(sender), payload.text.clone()),
            None => match split_inband_sender(&payload.text) {
                Some((sender, text)) => (Some(sender), text),
                None => (None, payload.text.clone()),
            },
        };

        debug!("Resolved channel message for {}", context);

        let message = Message {
            context: context.clone(),
            direction: Direction::Inbound,
            display_sender,
            text,
            timestamp: payload.effective_timestamp(),
            kind: MessageKind::Channel,
            channel_idx: Some(channel_idx),
            pubkey_prefix: None,
            enrichment: Enrichment {
                channel_name,
                sender_name: None,
            },
        };
        (context, message)
    }

    pub fn resolve_contact(
        &self,
        pubkey_prefix: Option<&KeyPrefix>,
        payload: &MessagePayload,
        directory: &dyn Directory,
    ) -> (ContextId, Message) {
        let prefix = pubkey_prefix.cloned().unwrap_or_else(KeyPrefix::unknown);
        let context = ContextId::Contact(prefix.clone());

        let sender_name = match directory.contact(&prefix) {
            Some(contact) => contact.display_name(),
            None => prefix.label(),
        };

        debug!("Resolved direct message for {}", context);

        let message = Message {
            context: context.clone(),
            direction: Direction::Inbound,
            display_sender: Some(sender_name.clone()),
            text: payload.text.clone(),
            timestamp: payload.effective_timestamp(),
            kind: MessageKind::Private,
            channel_idx: None,
            pubkey_prefix: Some(prefix),
            enrichment: Enrichment {
                channel_name: None,
                sender_name: Some(sender_name),
            },
        };
        (context, message)
    }
}
