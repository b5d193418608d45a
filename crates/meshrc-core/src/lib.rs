//! meshrc core
//!
//! Conversation state and event routing for a terminal mesh-radio chat client.
//! Inbound device events are resolved into conversation contexts, appended to
//! per-context history, tracked for unread state and rendered into grouped
//! timeline lines. User input is dispatched either as a chat message (with
//! optimistic local echo) or as a slash-command against the device gateway.
//!
//! ## Architecture
//!
//! - [`types`] - Context identity, messages and directory records
//! - [`gateway`] - Device gateway boundary: event union, commands, connector
//! - [`resolver`] - Turns raw inbound events into context-bound messages
//! - [`history`] - Append-only per-context message history
//! - [`unread`] - Per-context unread counters
//! - [`render`] - Timeline grouping and display lines
//! - [`session`] - Open tabs and the active context
//! - [`roster`] - Channel/contact list view model
//! - [`commands`] - Input classification and slash-command table
//! - [`persistence`] - JSON-lines and SQLite message logs
//! - [`engine`] - Coordinates the stores on a single event loop
//! - [`client`] - Wires a gateway to the engine

pub mod client;
pub mod commands;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod history;
pub mod persistence;
pub mod render;
pub mod resolver;
pub mod roster;
pub mod session;
pub mod types;
pub mod unread;

pub use client::MeshClient;
pub use commands::{ChannelSpec, CommandDispatcher, Dispatch, OutboundAction, TracePath};
pub use engine::{ConnectionState, ConversationEngine, EngineConfig, Notification, TabView};
pub use errors::{GatewayError, MeshrcError, PersistenceError, Result, Severity};
pub use gateway::{
    DeviceGateway, Directory, EventKind, EventReceiver, GatewayConnector, InboundEvent,
    MessagePayload, OfflineGateway, TransportConfig,
};
pub use history::HistoryStore;
pub use persistence::{JsonLinesSink, LogRecord, PersistenceSink, RecordSink, SqliteSink};
pub use render::{DisplayLine, DisplayZone, LogRenderer, RenderState};
pub use resolver::ContextResolver;
pub use roster::{Roster, RosterEntry};
pub use session::{SessionManager, Tab};
pub use types::{
    Channel, Contact, ContextId, Direction, KeyPrefix, Message, MessageKind, SystemTimeSource,
    TimeSource, UnixSeconds,
};
pub use unread::UnreadTracker;
