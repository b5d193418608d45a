//! Gateway-to-engine wiring
//!
//! [`MeshClient`] owns a connected gateway and the engine. It drains the
//! gateway's event subscription into the engine, performs the startup sync,
//! and executes dispatched input against the gateway. Every failure is
//! reported through the engine's notifications; none of these methods fail.

use tracing::{debug, info};

use crate::commands::{ChannelSpec, Dispatch, OutboundAction};
use crate::engine::ConversationEngine;
use crate::errors::{GatewayError, MeshrcError, Result, Severity};
use crate::gateway::{DeviceGateway, EventKind, EventReceiver, InboundEvent};
use crate::types::{Channel, Contact, KeyPrefix};

/// Channel slots probed during bootstrap
pub const MAX_CHANNEL_SLOTS: u32 = 64;

pub struct MeshClient<G: DeviceGateway> {
    gateway: G,
    engine: ConversationEngine,
    events: EventReceiver,
}

impl<G: DeviceGateway> MeshClient<G> {
    /// Subscribe to every event kind and adopt the device's own name
    pub fn new(gateway: G, mut engine: ConversationEngine) -> Self {
        let events = gateway.subscribe(EventKind::ALL);
        if let Some(name) = gateway.self_name() {
            engine.set_local_identity(name);
        }
        Self {
            gateway,
            engine,
            events,
        }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ConversationEngine {
        &mut self.engine
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ----- Startup -----

    /// Load the directories and drain messages queued on the device.
    ///
    /// Returns the number of backlog messages routed.
    pub async fn bootstrap(&mut self) -> usize {
        match self.gateway.get_contacts().await {
            Ok(contacts) => {
                self.handle_event(InboundEvent::ContactListUpdated(contacts));
            }
            Err(e) => self.engine.report(MeshrcError::Connection(e)),
        }

        self.refresh_channels().await;

        let synced = self.sync_pending().await;
        info!("Bootstrap complete, {} queued messages synced", synced);
        synced
    }

    /// Re-read the channel slots so tabs and the roster pick up new names
    pub async fn refresh_channels(&mut self) {
        let channels = self.fetch_channels().await;
        self.handle_event(InboundEvent::ChannelListUpdated(channels));
    }

    async fn fetch_channels(&mut self) -> Vec<Channel> {
        let mut channels = Vec::new();
        for idx in 0..MAX_CHANNEL_SLOTS {
            match self.gateway.get_channel(idx).await {
                Ok(Some(channel)) => channels.push(channel),
                Ok(None) | Err(GatewayError::NotFound(_)) => break,
                Err(e) => {
                    self.engine.report(MeshrcError::Connection(e));
                    break;
                }
            }
        }
        debug!("Fetched {} channel slots", channels.len());
        channels
    }

    /// Route queued device messages until the device reports none left
    pub async fn sync_pending(&mut self) -> usize {
        let mut synced = 0;
        loop {
            match self.gateway.fetch_pending().await {
                Ok(Some(event)) => {
                    self.handle_event(event);
                    synced += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.engine.report(MeshrcError::Connection(e));
                    break;
                }
            }
        }
        synced
    }

    // ----- Events -----

    pub fn handle_event(&mut self, event: InboundEvent) {
        self.engine.handle_event(&event, &self.gateway);
    }

    /// Apply every event already delivered, without waiting
    pub fn poll_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for and apply the next event. `false` once the gateway is gone.
    pub async fn next_event(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    // ----- Channel Management -----

    /// Configure a channel on the first unused slot
    pub async fn add_channel(&mut self, spec: &ChannelSpec) {
        let Some(idx) = self.engine.roster().free_channel_slot(MAX_CHANNEL_SLOTS) else {
            self.engine.report(MeshrcError::precondition(
                "channel",
                format!("All {MAX_CHANNEL_SLOTS} channel slots are in use"),
            ));
            return;
        };
        let done = format!("Added channel {}", spec.name);
        self.write_channel(idx, spec, done).await;
    }

    pub async fn edit_channel(&mut self, idx: u32, spec: &ChannelSpec) {
        let done = format!("Updated channel {idx} to {}", spec.name);
        self.write_channel(idx, spec, done).await;
    }

    /// Clear a slot by writing an empty name
    pub async fn delete_channel(&mut self, idx: u32) {
        let cleared = ChannelSpec {
            name: String::new(),
            key: None,
        };
        self.write_channel(idx, &cleared, format!("Deleted channel {idx}"))
            .await;
    }

    async fn write_channel(&mut self, idx: u32, spec: &ChannelSpec, done: String) {
        let action = OutboundAction::SetChannel {
            idx,
            name: spec.name.clone(),
            key: spec.key.clone(),
        };
        match self.execute(&action).await {
            Ok(()) => {
                self.engine.notify(Severity::Info, done);
                self.refresh_channels().await;
            }
            Err(e) => self.engine.report(e),
        }
    }

    // ----- Input -----

    /// Handle one submitted input line. Errors become notifications.
    pub async fn submit(&mut self, input: &str) {
        if let Err(e) = self.try_submit(input).await {
            self.engine.report(e);
        }
    }

    async fn try_submit(&mut self, input: &str) -> Result<()> {
        let Some(dispatch) = self.engine.dispatch(input)? else {
            return Ok(());
        };
        match dispatch {
            Dispatch::Message { action, echo } => {
                // Echo first; a failed send does not retract it
                self.engine.record_outbound(echo);
                self.execute(&action).await
            }
            Dispatch::Control(action) => self.execute(&action).await,
        }
    }

    /// Perform one outbound action against the gateway
    pub async fn execute(&mut self, action: &OutboundAction) -> Result<()> {
        let command = action.command_name();
        match action {
            OutboundAction::SendChannelMessage { idx, text } => {
                self.gateway
                    .send_channel_message(*idx, text)
                    .await
                    .map_err(MeshrcError::SendFailure)?;
                debug!("Sent channel message to {}", idx);
            }
            OutboundAction::SendDirectMessage { contact, text } => {
                let contact = self
                    .lookup_contact(contact)
                    .map_err(MeshrcError::SendFailure)?;
                self.gateway
                    .send_direct_message(&contact, text)
                    .await
                    .map_err(MeshrcError::SendFailure)?;
                debug!("Sent direct message to {}", contact.display_name());
            }
            OutboundAction::StatusRequest { contact } => {
                let contact = self.command_contact(command, contact)?;
                self.gateway
                    .status_request(&contact)
                    .await
                    .map_err(|source| command_failed(command, source))?;
                self.engine.notify(
                    Severity::Info,
                    format!("Status request sent to {}", contact.display_name()),
                );
            }
            OutboundAction::Login { contact, secret } => {
                let contact = self.command_contact(command, contact)?;
                self.gateway
                    .login(&contact, secret)
                    .await
                    .map_err(|source| command_failed(command, source))?;
                self.engine.notify(
                    Severity::Info,
                    format!("Login request sent to {}", contact.display_name()),
                );
            }
            OutboundAction::Logout { contact } => {
                let contact = self.command_contact(command, contact)?;
                self.gateway
                    .logout(&contact)
                    .await
                    .map_err(|source| command_failed(command, source))?;
                self.engine.notify(
                    Severity::Info,
                    format!("Logout sent to {}", contact.display_name()),
                );
            }
            OutboundAction::Trace { path } => {
                self.gateway
                    .trace(path)
                    .await
                    .map_err(|source| command_failed(command, source))?;
                self.engine
                    .notify(Severity::Info, format!("Trace sent: {path}"));
            }
            OutboundAction::SetChannel { idx, name, key } => {
                self.gateway
                    .set_channel(*idx, name, key.as_deref())
                    .await
                    .map_err(|source| command_failed(command, source))?;
                debug!("Channel slot {} written", idx);
            }
        }
        Ok(())
    }

    fn lookup_contact(&self, prefix: &KeyPrefix) -> std::result::Result<Contact, GatewayError> {
        self.gateway
            .contact(prefix)
            .ok_or_else(|| GatewayError::NotFound(format!("contact {prefix} not found locally")))
    }

    fn command_contact(&self, command: &str, prefix: &KeyPrefix) -> Result<Contact> {
        self.lookup_contact(prefix)
            .map_err(|source| command_failed(command, source))
    }
}

fn command_failed(command: &str, source: GatewayError) -> MeshrcError {
    MeshrcError::CommandFailed {
        command: command.to_string(),
        source,
    }
}
