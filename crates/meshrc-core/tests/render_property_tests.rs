//! Property-based tests for timeline grouping and context identity
//!
//! These tests verify that incremental rendering matches full rendering,
//! that the grouping window boundary is exact, and that resolution derives
//! the same context id every time.


use std::sync::Arc;

use meshrc_core::{
    Channel, Contact, ContextId, ContextResolver, Direction, DisplayZone, InboundEvent, KeyPrefix,
    LogRenderer, Message, MessageKind, MessagePayload, RenderState,
};
use meshrc_core::types::Enrichment;
use proptest::prelude::*;
use test_utils::{MockGateway, MockTimeSource};

fn renderer() -> LogRenderer {
    LogRenderer::new(DisplayZone::utc(), Arc::new(MockTimeSource::new_at(86_400)))
}

/// Generate a sender from a small pool so runs of the same sender are common
fn arb_sender() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("Alice".to_string())),
        Just(Some("Bob".to_string())),
        Just(Some("A very long sender name".to_string())),
    ]
}

/// Generate a timestamp step, including backwards clock skew and gaps
fn arb_step() -> impl Strategy<Value = i64> {
    prop_oneof![-120i64..0, 0i64..400, 400i64..10_000]
}

fn arb_messages() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec((arb_sender(), arb_step(), any::<bool>()), 0..40).prop_map(|specs| {
        let mut ts = 1_700_000_000i64;
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (sender, step, has_ts))| {
                ts += step;
                message(sender, &format!("m{i}"), has_ts.then_some(ts))
            })
            .collect()
    })
}

fn message(sender: Option<String>, text: &str, timestamp: Option<i64>) -> Message {
    Message {
        context: ContextId::Channel(0),
        direction: Direction::Inbound,
        display_sender: sender,
        text: text.to_string(),
        timestamp,
        kind: MessageKind::Channel,
        channel_idx: Some(0),
        pubkey_prefix: None,
        enrichment: Enrichment::default(),
    }
}

proptest! {
    /// Property: folding append_one equals render over the whole sequence
    #[test]
    fn fold_matches_full_render(messages in arb_messages()) {
        let r = renderer();
        let full = r.render(&messages);

        let mut state = RenderState::default();
        let mut folded = Vec::new();
        for m in &messages {
            let (line, next) = r.append_one(m, &state);
            folded.push(line);
            state = next;
        }

        prop_assert_eq!(full, folded);
    }

    /// Property: a render split at any point and resumed from the saved state
    /// matches rendering the whole sequence
    #[test]
    fn resumed_render_matches(messages in arb_messages(), split in 0usize..40) {
        let r = renderer();
        let split = split.min(messages.len());
        let (head, tail) = messages.split_at(split);

        let (mut lines, mut state) = r.render_with_state(head);
        for m in tail {
            let (line, next) = r.append_one(m, &state);
            lines.push(line);
            state = next;
        }

        prop_assert_eq!(lines, r.render(&messages));
    }

    /// Property: the grouping window is exactly 300 seconds
    #[test]
    fn grouping_boundary_is_exact(t in 0i64..4_000_000_000) {
        let r = renderer();
        let alice = Some("Alice".to_string());

        let inside = r.render(&[message(alice.clone(), "a", Some(t)), message(alice.clone(), "b", Some(t + 299))]);
        prop_assert_eq!(inside[1].sender.as_ref(), None);

        let outside = r.render(&[message(alice.clone(), "a", Some(t)), message(alice, "b", Some(t + 300))]);
        prop_assert_eq!(outside[1].sender.as_deref(), Some("Alice"));
        prop_assert!(outside[1].time.is_some());
    }

    /// Property: sender labels never exceed ten characters
    #[test]
    fn sender_labels_are_truncated(messages in arb_messages()) {
        for line in renderer().render(&messages) {
            if let Some(sender) = line.sender {
                prop_assert!(sender.chars().count() <= 10);
            }
        }
    }

    /// Property: resolving the same channel event twice yields the same id
    #[test]
    fn channel_identity_is_stable(idx in 0u32..256, text in "[a-zA-Z0-9 :]{0,40}") {
        let directory = MockGateway::new().with_channels(vec![Channel::new(0, "General")]);
        let event = InboundEvent::ChannelMessage { channel_idx: idx, payload: MessagePayload::text(text) };
        let resolver = ContextResolver::new();

        let first = resolver.resolve(&event, &directory).map(|(ctx, _)| ctx);
        let second = resolver.resolve(&event, &directory).map(|(ctx, _)| ctx);
        prop_assert_eq!(first.clone(), second);
        prop_assert_eq!(first, Some(ContextId::Channel(idx)));
    }

    /// Property: a contact's full key and its message prefix map to one context
    #[test]
    fn contact_identity_is_stable(key in "[0-9a-fA-F]{12,64}") {
        let directory = MockGateway::new().with_contacts(vec![Contact::new(key.clone(), "Peer")]);
        let prefix = KeyPrefix::new(&key[..12]);
        let event = InboundEvent::ContactMessage {
            pubkey_prefix: Some(prefix),
            payload: MessagePayload::text("hi"),
        };
        let resolver = ContextResolver::new();

        let (ctx, msg) = resolver.resolve(&event, &directory).expect("message events resolve");
        let (again, _) = resolver.resolve(&event, &directory).expect("message events resolve");
        prop_assert_eq!(&ctx, &again);
        prop_assert_eq!(ctx, ContextId::contact(key.as_str()));
        prop_assert_eq!(msg.display_sender.as_deref(), Some("Peer"));
    }
}
