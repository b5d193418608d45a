//! Conversation engine
//!
//! Owns every in-process store and is the only place they are mutated.
//! All methods run on the single event loop task, so nothing here locks.
//!
//! Inbound flow: resolve, persist, append to history, count unread, then
//! append to the active view if the message belongs to it. Badges are never
//! stored; tab and roster views read them from the unread tracker.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::commands::{CommandDispatcher, Dispatch, DEFAULT_IDENTITY};
use crate::errors::{MeshrcError, Result, Severity};
use crate::gateway::{Directory, InboundEvent, MessagePayload};
use crate::history::HistoryStore;
use crate::persistence::PersistenceSink;
use crate::render::{DisplayLine, DisplayZone, LogRenderer, RenderState};
use crate::resolver::ContextResolver;
use crate::roster::{Roster, RosterEntry};
use crate::session::SessionManager;
use crate::types::{Channel, Contact, ContextId, KeyPrefix, Message, TimeSource};
use crate::unread::UnreadTracker;

/// Notifications kept for the status line
pub const MAX_NOTIFICATIONS: usize = 200;

// ----------------------------------------------------------------------------
// Configuration and View Types
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sender label for local echo until the device reports its own name
    pub local_identity: String,
    pub zone: DisplayZone,
    /// Contacts starred at startup
    pub favorites: Vec<KeyPrefix>,
    pub notification_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_identity: DEFAULT_IDENTITY.to_string(),
            zone: DisplayZone::Local,
            favorites: Vec::new(),
            notification_capacity: MAX_NOTIFICATIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// User-visible report of something that happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

/// One entry of the tab strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub context: ContextId,
    pub label: String,
    pub badge: u32,
    pub active: bool,
}

/// Rendered timeline of the active context
#[derive(Debug, Default)]
struct ActiveView {
    lines: Vec<DisplayLine>,
    state: RenderState,
}

// ----------------------------------------------------------------------------
// Conversation Engine
// ----------------------------------------------------------------------------

pub struct ConversationEngine {
    resolver: ContextResolver,
    history: HistoryStore,
    unread: UnreadTracker,
    session: SessionManager,
    roster: Roster,
    renderer: LogRenderer,
    dispatcher: CommandDispatcher,
    persistence: PersistenceSink,
    view: ActiveView,
    notifications: VecDeque<Notification>,
    notification_capacity: usize,
    connection: ConnectionState,
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("active", &self.session.active())
            .field("tabs", &self.session.tabs().len())
            .field("messages", &self.history.total_messages())
            .field("connection", &self.connection)
            .finish()
    }
}

impl ConversationEngine {
    pub fn new(config: EngineConfig, clock: Arc<dyn TimeSource>, persistence: PersistenceSink) -> Self {
        Self {
            resolver: ContextResolver::new(),
            history: HistoryStore::new(),
            unread: UnreadTracker::new(),
            session: SessionManager::new(),
            roster: Roster::with_favorites(config.favorites),
            renderer: LogRenderer::new(config.zone, clock.clone()),
            dispatcher: CommandDispatcher::new(config.local_identity, clock),
            persistence,
            view: ActiveView::default(),
            notifications: VecDeque::new(),
            notification_capacity: config.notification_capacity.max(1),
            connection: ConnectionState::default(),
        }
    }

    // ----- Inbound -----

    /// Apply one gateway event. Returns the context a message was routed to.
    pub fn handle_event(&mut self, event: &InboundEvent, directory: &dyn Directory) -> Option<ContextId> {
        match event {
            InboundEvent::ChannelMessage { payload, .. }
            | InboundEvent::ContactMessage { payload, .. } => {
                let (context, message) = self.resolver.resolve(event, directory)?;
                self.ingest(context.clone(), message, payload);
                Some(context)
            }
            InboundEvent::ContactListUpdated(contacts) => {
                self.update_contacts(contacts.clone());
                None
            }
            InboundEvent::ChannelListUpdated(channels) => {
                self.update_channels(channels.clone());
                None
            }
            InboundEvent::Connected => {
                self.set_connection_state(ConnectionState::Connected);
                self.notify(Severity::Info, "Connected");
                None
            }
            InboundEvent::Disconnected { reason } => {
                self.set_connection_state(ConnectionState::Disconnected);
                let message = match reason {
                    Some(reason) => format!("Disconnected: {reason}"),
                    None => "Disconnected".to_string(),
                };
                self.notify(Severity::Error, message);
                None
            }
        }
    }

    fn ingest(&mut self, context: ContextId, message: Message, payload: &MessagePayload) {
        let raw = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.persist(&message, &raw);

        // Direct messages open a tab so the conversation is reachable
        if context.is_contact() && !self.session.is_open(&context) {
            let label = self.roster.label_for(&context);
            self.session.open(context.clone(), label);
        }

        self.unread.on_message(&context);
        self.append(message);
        debug!(
            "Routed inbound message to {} (unread {})",
            context,
            self.unread.count(&context)
        );
    }

    /// Append a local echo. Called before the gateway send is attempted.
    pub fn record_outbound(&mut self, echo: Message) {
        self.persist(&echo, &Map::new());
        self.append(echo);
    }

    fn append(&mut self, message: Message) {
        if self.session.is_active(&message.context) {
            let (line, next) = self.renderer.append_one(&message, &self.view.state);
            self.view.lines.push(line);
            self.view.state = next;
        }
        self.history.append(message);
    }

    fn persist(&mut self, message: &Message, raw: &Map<String, Value>) {
        for err in self.persistence.record(message, raw) {
            self.report(MeshrcError::Persistence(err));
        }
    }

    pub fn update_contacts(&mut self, contacts: Vec<Contact>) {
        info!("Contact list updated: {} contacts", contacts.len());
        self.roster.set_contacts(contacts);
        self.refresh_labels();
    }

    pub fn update_channels(&mut self, channels: Vec<Channel>) {
        info!("Channel list updated: {} channels", channels.len());
        self.roster.set_channels(channels);
        self.refresh_labels();
    }

    fn refresh_labels(&mut self) {
        let labels: Vec<(ContextId, String)> = self
            .session
            .tabs()
            .iter()
            .map(|tab| (tab.context.clone(), self.roster.label_for(&tab.context)))
            .collect();
        for (context, label) in labels {
            self.session.relabel(&context, label);
        }
    }

    // ----- Session -----

    /// Open a tab without activating it
    pub fn open(&mut self, context: ContextId) -> bool {
        let label = self.roster.label_for(&context);
        self.session.open(context, label)
    }

    /// Activation protocol: open, clear unread, set active, rebuild the view
    pub fn activate(&mut self, context: &ContextId) {
        let label = self.roster.label_for(context);
        self.session.activate(context, label);
        self.unread.on_activate(context);

        let (lines, state) = self.renderer.render_with_state(self.history.get(context));
        self.view = ActiveView { lines, state };
        info!("Activated {} ({} messages)", context, self.view.lines.len());
    }

    /// Close a tab. Closing the active tab leaves no active context.
    pub fn close(&mut self, context: &ContextId) -> bool {
        let was_active = self.session.is_active(context);
        if !self.session.close(context) {
            return false;
        }
        if was_active {
            self.unread.on_deactivate();
            self.view = ActiveView::default();
        }
        true
    }

    pub fn next(&mut self) -> Option<ContextId> {
        let target = self.session.next()?;
        self.activate(&target);
        Some(target)
    }

    pub fn previous(&mut self) -> Option<ContextId> {
        let target = self.session.previous()?;
        self.activate(&target);
        Some(target)
    }

    pub fn next_with_unread(&mut self) -> Option<ContextId> {
        let target = self.session.next_with_unread(&self.unread)?;
        self.activate(&target);
        Some(target)
    }

    /// Blank the timeline of `context` if it is shown. History is kept and
    /// the next activation renders it again.
    pub fn clear_view(&mut self, context: &ContextId) {
        if self.session.is_active(context) {
            self.view = ActiveView::default();
        }
    }

    // ----- Input -----

    /// Classify a line of user input against the active context
    pub fn dispatch(&self, input: &str) -> Result<Option<Dispatch>> {
        self.dispatcher.dispatch(input, self.session.active())
    }

    pub fn set_local_identity(&mut self, name: impl Into<String>) {
        self.dispatcher.set_local_identity(name);
    }

    pub fn local_identity(&self) -> &str {
        self.dispatcher.local_identity()
    }

    // ----- Roster -----

    pub fn toggle_favorite(&mut self, context: &ContextId) -> Option<bool> {
        self.roster.toggle_favorite(context)
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.roster.set_search(query);
    }

    pub fn search(&self) -> &str {
        self.roster.search()
    }

    pub fn roster_view(&self) -> Vec<RosterEntry> {
        self.roster.entries(&self.unread)
    }

    pub fn label_for(&self, context: &ContextId) -> String {
        self.roster.label_for(context)
    }

    // ----- Views -----

    pub fn badge(&self, context: &ContextId) -> u32 {
        self.unread.count(context)
    }

    pub fn tab_strip(&self) -> Vec<TabView> {
        let active = self.session.active();
        self.session
            .tabs()
            .iter()
            .map(|tab| TabView {
                context: tab.context.clone(),
                label: tab.label.clone(),
                badge: self.unread.count(&tab.context),
                active: active == Some(&tab.context),
            })
            .collect()
    }

    pub fn view_lines(&self) -> &[DisplayLine] {
        &self.view.lines
    }

    pub fn active(&self) -> Option<&ContextId> {
        self.session.active()
    }

    /// Index of the active context when it is a channel
    pub fn active_channel(&self) -> Option<u32> {
        match self.session.active()? {
            ContextId::Channel(idx) => Some(*idx),
            ContextId::Contact(_) => None,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    // ----- Connection and Notifications -----

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection != state {
            info!("Connection state: {}", state.as_str());
            self.connection = state;
        }
    }

    pub fn notify(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
        if self.notifications.len() == self.notification_capacity {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification { severity, message });
    }

    /// Turn an error into a notification; processing continues
    pub fn report(&mut self, err: MeshrcError) {
        let severity = err.severity();
        self.notify(severity, err.to_string());
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn latest_notification(&self) -> Option<&Notification> {
        self.notifications.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SystemTimeSource;

    fn engine_with_capacity(capacity: usize) -> ConversationEngine {
        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let config = EngineConfig {
            notification_capacity: capacity,
            ..EngineConfig::default()
        };
        ConversationEngine::new(config, clock.clone(), PersistenceSink::disabled(clock))
    }

    #[test]
    fn test_notification_queue_is_bounded() {
        let mut engine = engine_with_capacity(3);
        for i in 0..5 {
            engine.notify(Severity::Info, format!("n{i}"));
        }
        let messages: Vec<_> = engine.notifications().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["n2", "n3", "n4"]);
        assert_eq!(engine.latest_notification().map(|n| n.message.as_str()), Some("n4"));
    }

    #[test]
    fn test_report_uses_error_severity() {
        let mut engine = engine_with_capacity(10);
        engine.report(MeshrcError::UnknownCommand("nope".to_string()));
        let latest = engine.latest_notification().unwrap();
        assert_eq!(latest.severity, Severity::Error);
        assert_eq!(latest.message, "Unknown command: /nope");
    }

    #[test]
    fn test_connection_events() {
        let mut engine = engine_with_capacity(10);
        let directory = crate::gateway::OfflineGateway::new();
        assert_eq!(engine.connection_state(), ConnectionState::Connecting);
        engine.handle_event(&InboundEvent::Connected, &directory);
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
        engine.handle_event(
            &InboundEvent::Disconnected {
                reason: Some("link lost".to_string()),
            },
            &directory,
        );
        assert_eq!(engine.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            engine.latest_notification().map(|n| n.message.as_str()),
            Some("Disconnected: link lost")
        );
    }
}
