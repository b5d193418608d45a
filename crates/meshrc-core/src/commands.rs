//! Input classification and the slash-command table
//!
//! Every submitted line is either a chat message for the current context
//! (with an optimistic local echo) or a slash-command that resolves to a
//! control action against the device. Nothing is ever silently dropped and a
//! failed command never falls through to being sent as chat text.

use core::fmt;
use std::sync::Arc;

use crate::errors::{MeshrcError, Result};
use crate::types::{
    ContextId, Direction, Enrichment, KeyPrefix, Message, TimeSource, UnixSeconds,
};

/// Leading character that marks a line as a command
pub const COMMAND_PREFIX: char = '/';

/// Local name used when neither the device nor the config supplies one
pub const DEFAULT_IDENTITY: &str = "Me";

const LOGIN_USAGE: &str = "Usage: /login <password>";
const TRACE_USAGE: &str = "Usage: /trace <path_hex_csv>";
const SELECT_CONTACT: &str = "Select a contact first";
const SELECT_REPEATER: &str = "Select a contact/repeater first";

/// Channel secrets are 16 bytes, typed as 32 hex digits
const CHANNEL_KEY_LEN: usize = 16;

// ----------------------------------------------------------------------------
// Trace Path
// ----------------------------------------------------------------------------

/// Route for a trace request: one byte per hop, written as comma-separated hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePath(Vec<u8>);

impl TracePath {
    /// Parse `"a1,0f,3c"`. Every hop must be exactly one hex byte.
    pub fn parse(raw: &str) -> Option<Self> {
        let hops = raw
            .split(',')
            .map(|hop| match hex::decode(hop.trim()) {
                Ok(bytes) if bytes.len() == 1 => Some(bytes[0]),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()?;
        Some(Self(hops))
    }

    /// Single-hop path to a contact: the first byte of its key prefix
    pub fn from_contact(prefix: &KeyPrefix) -> Option<Self> {
        let first = prefix.as_str().get(..2)?;
        Self::parse(first)
    }

    pub fn hops(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TracePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.0.iter().map(|hop| hex::encode([*hop])).collect();
        f.write_str(&hops.join(","))
    }
}

// ----------------------------------------------------------------------------
// Channel Spec
// ----------------------------------------------------------------------------

/// Name and optional secret for a channel slot, typed as `name [key]`.
///
/// A trailing word of 32 hex digits is taken as the channel secret; any
/// other text, spaces included, is the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub key: Option<String>,
}

impl ChannelSpec {
    /// `None` when no name is left after the key is split off
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, key) = match input.rsplit_once(char::is_whitespace) {
            Some((name, last)) if is_channel_key(last) => {
                (name.trim_end(), Some(last.to_ascii_lowercase()))
            }
            _ => (input, None),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            key,
        })
    }
}

fn is_channel_key(word: &str) -> bool {
    matches!(hex::decode(word), Ok(bytes) if bytes.len() == CHANNEL_KEY_LEN)
}

// ----------------------------------------------------------------------------
// Outbound Actions
// ----------------------------------------------------------------------------

/// A request the client forwards to the device gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    SendChannelMessage { idx: u32, text: String },
    SendDirectMessage { contact: KeyPrefix, text: String },
    StatusRequest { contact: KeyPrefix },
    Login { contact: KeyPrefix, secret: String },
    Logout { contact: KeyPrefix },
    Trace { path: TracePath },
    /// Write a channel slot; an empty name clears it
    SetChannel { idx: u32, name: String, key: Option<String> },
}

impl OutboundAction {
    /// Command name used in notifications
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::SendChannelMessage { .. } | Self::SendDirectMessage { .. } => "msg",
            Self::StatusRequest { .. } => "status",
            Self::Login { .. } => "login",
            Self::Logout { .. } => "logout",
            Self::Trace { .. } => "trace",
            Self::SetChannel { .. } => "channel",
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(
            self,
            Self::SendChannelMessage { .. } | Self::SendDirectMessage { .. }
        )
    }
}

/// Outcome of classifying one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Chat text: append `echo` to history first, then perform `action`
    Message { action: OutboundAction, echo: Message },
    /// Slash-command: perform `action`, nothing is appended
    Control(OutboundAction),
}

// ----------------------------------------------------------------------------
// Command Dispatcher
// ----------------------------------------------------------------------------

pub struct CommandDispatcher {
    local_identity: String,
    clock: Arc<dyn TimeSource>,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("local_identity", &self.local_identity)
            .finish()
    }
}

impl CommandDispatcher {
    pub fn new(local_identity: impl Into<String>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            local_identity: local_identity.into(),
            clock,
        }
    }

    pub fn local_identity(&self) -> &str {
        &self.local_identity
    }

    /// Adopt the name the device advertises; blank names are ignored
    pub fn set_local_identity(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.trim().is_empty() {
            self.local_identity = name;
        }
    }

    /// Classify one input line against the current context.
    ///
    /// Blank input yields `Ok(None)`.
    pub fn dispatch(&self, input: &str, current: Option<&ContextId>) -> Result<Option<Dispatch>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        if let Some(command_line) = input.strip_prefix(COMMAND_PREFIX) {
            return self.dispatch_command(command_line, current).map(Some);
        }

        let context = current.ok_or(MeshrcError::NoActiveContext)?;
        let action = match context {
            ContextId::Channel(idx) => OutboundAction::SendChannelMessage {
                idx: *idx,
                text: input.to_string(),
            },
            ContextId::Contact(prefix) => OutboundAction::SendDirectMessage {
                contact: prefix.clone(),
                text: input.to_string(),
            },
        };
        let echo = self.local_echo(context, input, self.clock.now());
        Ok(Some(Dispatch::Message { action, echo }))
    }

    fn dispatch_command(&self, command_line: &str, current: Option<&ContextId>) -> Result<Dispatch> {
        let (name, args) = match command_line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (command_line, ""),
        };
        let name = name.to_lowercase();
        let contact = current.and_then(ContextId::as_contact);

        let action = match name.as_str() {
            "status" | "rs" => OutboundAction::StatusRequest {
                contact: contact
                    .ok_or_else(|| MeshrcError::precondition("status", SELECT_REPEATER))?
                    .clone(),
            },
            "login" => {
                let contact = contact
                    .ok_or_else(|| MeshrcError::precondition("login", SELECT_CONTACT))?
                    .clone();
                if args.is_empty() {
                    return Err(MeshrcError::precondition("login", LOGIN_USAGE));
                }
                OutboundAction::Login {
                    contact,
                    secret: args.to_string(),
                }
            }
            "logout" => OutboundAction::Logout {
                contact: contact
                    .ok_or_else(|| MeshrcError::precondition("logout", SELECT_CONTACT))?
                    .clone(),
            },
            "trace" => {
                let path = match (args.is_empty(), contact) {
                    (false, _) => TracePath::parse(args),
                    (true, Some(prefix)) => TracePath::from_contact(prefix),
                    (true, None) => None,
                };
                OutboundAction::Trace {
                    path: path.ok_or_else(|| MeshrcError::precondition("trace", TRACE_USAGE))?,
                }
            }
            _ => return Err(MeshrcError::UnknownCommand(name)),
        };
        Ok(Dispatch::Control(action))
    }

    fn local_echo(&self, context: &ContextId, text: &str, timestamp: UnixSeconds) -> Message {
        let (channel_idx, pubkey_prefix) = match context {
            ContextId::Channel(idx) => (Some(*idx), None),
            ContextId::Contact(prefix) => (None, Some(prefix.clone())),
        };
        Message {
            context: context.clone(),
            direction: Direction::Outbound,
            display_sender: Some(self.local_identity.clone()),
            text: text.to_string(),
            timestamp: Some(timestamp),
            kind: context.message_kind(),
            channel_idx,
            pubkey_prefix,
            enrichment: Enrichment {
                channel_name: None,
                sender_name: Some(self.local_identity.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;

    struct FixedClock;

    impl TimeSource for FixedClock {
        fn now(&self) -> UnixSeconds {
            4242
        }
    }

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new("Me", Arc::new(FixedClock))
    }

    fn contact() -> ContextId {
        ContextId::contact("a1b2c3d4e5f6")
    }

    #[test]
    fn test_plain_text_in_channel_produces_echo() {
        let dispatch = dispatcher()
            .dispatch("  hello mesh ", Some(&ContextId::Channel(0)))
            .unwrap();
        match dispatch {
            Some(Dispatch::Message { action, echo }) => {
                assert_eq!(
                    action,
                    OutboundAction::SendChannelMessage {
                        idx: 0,
                        text: "hello mesh".to_string()
                    }
                );
                assert_eq!(echo.direction, Direction::Outbound);
                assert_eq!(echo.display_sender.as_deref(), Some("Me"));
                assert_eq!(echo.timestamp, Some(4242));
                assert_eq!(echo.kind, MessageKind::Channel);
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_without_context_is_rejected() {
        let err = dispatcher().dispatch("hello", None).unwrap_err();
        assert!(matches!(err, MeshrcError::NoActiveContext));
    }

    #[test]
    fn test_blank_input_is_ignored() {
        assert_eq!(dispatcher().dispatch("   ", None).unwrap(), None);
    }

    #[test]
    fn test_status_alias_and_case() {
        let d = dispatcher();
        let expected = Some(Dispatch::Control(OutboundAction::StatusRequest {
            contact: KeyPrefix::new("a1b2c3d4e5f6"),
        }));
        assert_eq!(d.dispatch("/rs", Some(&contact())).unwrap(), expected);
        assert_eq!(d.dispatch("/STATUS", Some(&contact())).unwrap(), expected);
    }

    #[test]
    fn test_contact_commands_need_contact_context() {
        let d = dispatcher();
        for line in ["/status", "/login pw", "/logout"] {
            let err = d.dispatch(line, Some(&ContextId::Channel(0))).unwrap_err();
            assert!(matches!(err, MeshrcError::CommandPrecondition { .. }), "{line}");
        }
    }

    #[test]
    fn test_login_requires_secret() {
        let err = dispatcher().dispatch("/login", Some(&contact())).unwrap_err();
        assert_eq!(err.to_string(), "Usage: /login <password>");

        let ok = dispatcher().dispatch("/login hunter2 x", Some(&contact())).unwrap();
        assert_eq!(
            ok,
            Some(Dispatch::Control(OutboundAction::Login {
                contact: KeyPrefix::new("a1b2c3d4e5f6"),
                secret: "hunter2 x".to_string()
            }))
        );
    }

    #[test]
    fn test_trace_without_context_or_path() {
        let err = dispatcher().dispatch("/trace", None).unwrap_err();
        assert_eq!(err.to_string(), "Usage: /trace <path_hex_csv>");
    }

    #[test]
    fn test_trace_defaults_to_contact_first_byte() {
        let dispatch = dispatcher().dispatch("/trace", Some(&contact())).unwrap();
        match dispatch {
            Some(Dispatch::Control(OutboundAction::Trace { path })) => {
                assert_eq!(path.hops(), &[0xa1]);
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_trace_explicit_path() {
        let dispatch = dispatcher()
            .dispatch("/trace a1, 0F,3c", Some(&ContextId::Channel(0)))
            .unwrap();
        match dispatch {
            Some(Dispatch::Control(OutboundAction::Trace { path })) => {
                assert_eq!(path.hops(), &[0xa1, 0x0f, 0x3c]);
                assert_eq!(path.to_string(), "a1,0f,3c");
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_trace_path() {
        for line in ["/trace zz", "/trace a1,,b2", "/trace a1b2"] {
            let err = dispatcher().dispatch(line, None).unwrap_err();
            assert!(matches!(err, MeshrcError::CommandPrecondition { .. }), "{line}");
        }
    }

    #[test]
    fn test_unknown_command_is_not_sent_as_text() {
        let err = dispatcher()
            .dispatch("/frobnicate now", Some(&ContextId::Channel(0)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: /frobnicate");
    }

    #[test]
    fn test_channel_spec_splits_trailing_key() {
        let key = "00112233445566778899AABBCCDDEEFF";
        assert_eq!(
            ChannelSpec::parse(&format!("  Night Ops {key} ")),
            Some(ChannelSpec {
                name: "Night Ops".to_string(),
                key: Some(key.to_ascii_lowercase()),
            })
        );
        // Short hex words are part of the name
        assert_eq!(
            ChannelSpec::parse("Ops beef").map(|spec| spec.name),
            Some("Ops beef".to_string())
        );
        assert_eq!(ChannelSpec::parse("   "), None);
        assert_eq!(ChannelSpec::parse(key).map(|spec| spec.key), Some(None));
    }

    #[test]
    fn test_local_identity_ignores_blank() {
        let mut d = dispatcher();
        d.set_local_identity("  ");
        assert_eq!(d.local_identity(), "Me");
        d.set_local_identity("Base");
        assert_eq!(d.local_identity(), "Base");
    }
}
