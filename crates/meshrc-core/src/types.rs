//! Core types for meshrc
//!
//! Context identity, the immutable message record, and the directory records
//! (channels and contacts) the device maintains.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch, as reported by device clocks
pub type UnixSeconds = i64;

// ----------------------------------------------------------------------------
// Key Prefix
// ----------------------------------------------------------------------------

/// Short identifying fragment of a contact's public key.
///
/// Always lowercase and at most [`KeyPrefix::LEN`] characters, so a full
/// public key from the contact list and the prefix carried by a direct
/// message normalize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Number of hex characters the firmware uses to attribute messages
    pub const LEN: usize = 12;
    /// Characters kept when a prefix is used as a display label
    pub const LABEL_LEN: usize = 8;

    pub fn new(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .chars()
            .take(Self::LEN)
            .flat_map(char::to_lowercase)
            .collect();
        Self(normalized)
    }

    /// Placeholder used when a contact event carries no key at all
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Degraded but stable label for contacts missing from the directory
    pub fn label(&self) -> String {
        self.0.chars().take(Self::LABEL_LEN).collect()
    }
}

impl From<String> for KeyPrefix {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for KeyPrefix {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<KeyPrefix> for String {
    fn from(prefix: KeyPrefix) -> Self {
        prefix.0
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Context Identity
// ----------------------------------------------------------------------------

/// An addressable conversation: one mesh channel or one peer contact.
///
/// This is the join key between history, unread counters, open tabs and
/// view badges. Display names are looked up by id and never part of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextId {
    Channel(u32),
    Contact(KeyPrefix),
}

impl ContextId {
    pub fn contact(prefix: impl Into<KeyPrefix>) -> Self {
        Self::Contact(prefix.into())
    }

    pub fn is_contact(&self) -> bool {
        matches!(self, Self::Contact(_))
    }

    pub fn as_contact(&self) -> Option<&KeyPrefix> {
        match self {
            Self::Contact(prefix) => Some(prefix),
            Self::Channel(_) => None,
        }
    }

    pub fn message_kind(&self) -> MessageKind {
        match self {
            Self::Channel(_) => MessageKind::Channel,
            Self::Contact(_) => MessageKind::Private,
        }
    }

    /// Label used before any directory information is known
    pub fn fallback_label(&self) -> String {
        match self {
            Self::Channel(idx) => format!("#{idx}"),
            Self::Contact(prefix) => prefix.label(),
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(idx) => write!(f, "chan_{idx}"),
            Self::Contact(prefix) => write!(f, "contact_{prefix}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Mesh message kind, serialized the way device logs spell it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "CHAN")]
    Channel,
    #[serde(rename = "PRIV")]
    Private,
}

/// Names looked up from the directory when the message was resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub channel_name: Option<String>,
    pub sender_name: Option<String>,
}

/// Immutable record of one chat message.
///
/// Created by the resolver (inbound) or the command dispatcher (local echo)
/// and only ever handed out by shared reference once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub context: ContextId,
    pub direction: Direction,
    /// `None` means the sender is unknown and the label is omitted
    pub display_sender: Option<String>,
    pub text: String,
    /// Device clock; may be skewed or missing. Ordering is by arrival.
    pub timestamp: Option<UnixSeconds>,
    pub kind: MessageKind,
    pub channel_idx: Option<u32>,
    pub pubkey_prefix: Option<KeyPrefix>,
    pub enrichment: Enrichment,
}

// ----------------------------------------------------------------------------
// Directory Records
// ----------------------------------------------------------------------------

/// A channel slot configured on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "channel_idx")]
    pub index: u32,
    #[serde(rename = "channel_name", default)]
    pub name: String,
}

impl Channel {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// A peer advertised to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub public_key: String,
    #[serde(default)]
    pub adv_name: String,
}

impl Contact {
    pub fn new(public_key: impl Into<String>, adv_name: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            adv_name: adv_name.into(),
        }
    }

    pub fn key_prefix(&self) -> KeyPrefix {
        KeyPrefix::new(&self.public_key)
    }

    /// Advertised name, or the key label when the contact never advertised one
    pub fn display_name(&self) -> String {
        if self.adv_name.trim().is_empty() {
            self.key_prefix().label()
        } else {
            self.adv_name.clone()
        }
    }
}

// ----------------------------------------------------------------------------
// Time Source
// ----------------------------------------------------------------------------

/// Wall clock abstraction so rendering and echo timestamps are testable
pub trait TimeSource: Send + Sync {
    fn now(&self) -> UnixSeconds;
}

/// Time source backed by the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> UnixSeconds {
        chrono::Utc::now().timestamp()
    }
}
