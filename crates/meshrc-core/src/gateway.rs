//! Device gateway boundary
//!
//! The mesh protocol driver (serial, TCP or BLE link plus command framing) is
//! an external collaborator. The core only sees it through [`DeviceGateway`]:
//! a closed union of already-decoded inbound events, a set of async commands,
//! and read access to the device's channel and contact directories.

use core::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::commands::TracePath;
use crate::errors::GatewayError;
use crate::types::{Channel, Contact, KeyPrefix, UnixSeconds};

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Receiving half of an event subscription
pub type EventReceiver = mpsc::UnboundedReceiver<InboundEvent>;

// ----------------------------------------------------------------------------
// Inbound Events
// ----------------------------------------------------------------------------

/// Decoded body of a chat message as delivered by the device.
///
/// Fields the core does not interpret are kept in `extra` and passed through
/// to the message logs untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_timestamp: Option<UnixSeconds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UnixSeconds>,
    /// Explicit sender name, when the device supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: UnixSeconds) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sender clock if present, else the receive timestamp
    pub fn effective_timestamp(&self) -> Option<UnixSeconds> {
        self.sender_timestamp.or(self.timestamp)
    }
}

/// Every event kind the device gateway can deliver
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ContactMessage {
        pubkey_prefix: Option<KeyPrefix>,
        payload: MessagePayload,
    },
    ChannelMessage {
        channel_idx: u32,
        payload: MessagePayload,
    },
    ContactListUpdated(Vec<Contact>),
    ChannelListUpdated(Vec<Channel>),
    Connected,
    Disconnected {
        reason: Option<String>,
    },
}

/// Subscription key for [`InboundEvent`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContactMessage,
    ChannelMessage,
    ContactListUpdated,
    ChannelListUpdated,
    Connected,
    Disconnected,
}

impl EventKind {
    pub const ALL: &'static [EventKind] = &[
        EventKind::ContactMessage,
        EventKind::ChannelMessage,
        EventKind::ContactListUpdated,
        EventKind::ChannelListUpdated,
        EventKind::Connected,
        EventKind::Disconnected,
    ];
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ContactMessage { .. } => EventKind::ContactMessage,
            Self::ChannelMessage { .. } => EventKind::ChannelMessage,
            Self::ContactListUpdated(_) => EventKind::ContactListUpdated,
            Self::ChannelListUpdated(_) => EventKind::ChannelListUpdated,
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
        }
    }
}

// ----------------------------------------------------------------------------
// Directory
// ----------------------------------------------------------------------------

/// Read access to the device-maintained channel and contact lists
pub trait Directory {
    fn channel(&self, idx: u32) -> Option<Channel>;
    fn contact(&self, prefix: &KeyPrefix) -> Option<Contact>;

    /// Current display name of a channel, if it has a non-empty one
    fn channel_name(&self, idx: u32) -> Option<String> {
        self.channel(idx)
            .map(|channel| channel.name)
            .filter(|name| !name.is_empty())
    }
}

// ----------------------------------------------------------------------------
// Device Gateway
// ----------------------------------------------------------------------------

/// Commands and subscriptions offered by a connected mesh device
#[async_trait]
pub trait DeviceGateway: Directory + Send + Sync {
    /// Subscribe to the given event kinds. Events arrive in delivery order.
    fn subscribe(&self, kinds: &[EventKind]) -> EventReceiver;

    /// Name the device advertises for the local node
    fn self_name(&self) -> Option<String>;

    async fn send_channel_message(&self, idx: u32, text: &str) -> GatewayResult<()>;
    async fn send_direct_message(&self, contact: &Contact, text: &str) -> GatewayResult<()>;
    async fn get_contacts(&self) -> GatewayResult<Vec<Contact>>;
    /// `Ok(None)` when the slot is not configured
    async fn get_channel(&self, idx: u32) -> GatewayResult<Option<Channel>>;
    /// Write a channel slot. An empty `name` clears the slot.
    async fn set_channel(&self, idx: u32, name: &str, key: Option<&str>) -> GatewayResult<()>;
    /// Next message queued on the device while the client was away
    async fn fetch_pending(&self) -> GatewayResult<Option<InboundEvent>>;
    async fn status_request(&self, contact: &Contact) -> GatewayResult<()>;
    async fn login(&self, contact: &Contact, secret: &str) -> GatewayResult<()>;
    async fn logout(&self, contact: &Contact) -> GatewayResult<()>;
    async fn trace(&self, path: &TracePath) -> GatewayResult<()>;
}

// ----------------------------------------------------------------------------
// Transport Selection
// ----------------------------------------------------------------------------

/// Default serial baud rate
pub const DEFAULT_BAUDRATE: u32 = 115_200;
/// Default TCP port of a networked companion device
pub const DEFAULT_TCP_PORT: u16 = 4403;

/// Link used to reach the device; exactly one is selected per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Serial { port: String, baudrate: u32 },
    Tcp { host: String, port: u16 },
    Ble { address: String },
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serial { .. } => "serial",
            Self::Tcp { .. } => "tcp",
            Self::Ble { .. } => "ble",
        }
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { port, baudrate } => write!(f, "serial {port} @ {baudrate}"),
            Self::Tcp { host, port } => write!(f, "tcp {host}:{port}"),
            Self::Ble { address } => write!(f, "ble {address}"),
        }
    }
}

/// Opens a gateway for a transport configuration
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    type Gateway: DeviceGateway;

    async fn connect(&self, config: &TransportConfig) -> GatewayResult<Self::Gateway>;
}

// ----------------------------------------------------------------------------
// Offline Gateway
// ----------------------------------------------------------------------------

/// Gateway used when no device could be reached.
///
/// It delivers no events, knows no contacts or channels, and rejects every
/// command with [`GatewayError::Disconnected`], so the client stays usable
/// and every outbound attempt is reported.
#[derive(Debug, Default)]
pub struct OfflineGateway {
    // Subscriptions stay open for the life of the gateway
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InboundEvent>>>,
}

impl OfflineGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for OfflineGateway {
    fn channel(&self, _idx: u32) -> Option<Channel> {
        None
    }

    fn contact(&self, _prefix: &KeyPrefix) -> Option<Contact> {
        None
    }
}

#[async_trait]
impl DeviceGateway for OfflineGateway {
    fn subscribe(&self, _kinds: &[EventKind]) -> EventReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    fn self_name(&self) -> Option<String> {
        None
    }

    async fn send_channel_message(&self, _idx: u32, _text: &str) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn send_direct_message(&self, _contact: &Contact, _text: &str) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn get_contacts(&self) -> GatewayResult<Vec<Contact>> {
        Err(GatewayError::Disconnected)
    }

    async fn get_channel(&self, _idx: u32) -> GatewayResult<Option<Channel>> {
        Err(GatewayError::Disconnected)
    }

    async fn set_channel(&self, _idx: u32, _name: &str, _key: Option<&str>) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn fetch_pending(&self) -> GatewayResult<Option<InboundEvent>> {
        Ok(None)
    }

    async fn status_request(&self, _contact: &Contact) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn login(&self, _contact: &Contact, _secret: &str) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn logout(&self, _contact: &Contact) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }

    async fn trace(&self, _path: &TracePath) -> GatewayResult<()> {
        Err(GatewayError::Disconnected)
    }
}
