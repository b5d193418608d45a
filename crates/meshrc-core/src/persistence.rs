//! Message logs
//!
//! Every inbound message and every local echo can be written to two
//! independent sinks: an append-only JSON-lines file and a `msgs` table in a
//! SQLite database. Writes are best-effort. A failing sink is reported but
//! never skips the other sink and never touches in-memory state.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::PersistenceError;
use crate::types::{Direction, Message, MessageKind, TimeSource, UnixSeconds};

/// Keys owned by [`LogRecord`] or internal to the client; never copied from raw
const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "sender",
    "name",
    "text",
    "type",
    "channel_idx",
    "pubkey_prefix",
    "context_type",
    "sender_name",
    "channel_name",
];

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS msgs (
    timestamp INTEGER,
    sender TEXT,
    name TEXT,
    text TEXT,
    type TEXT,
    channel_idx INTEGER,
    pubkey_prefix TEXT,
    raw_json TEXT
)";

const INSERT_ROW: &str = "INSERT INTO msgs (timestamp, sender, name, text, type, channel_idx, pubkey_prefix, raw_json)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

// ----------------------------------------------------------------------------
// Log Record
// ----------------------------------------------------------------------------

/// One persisted message, in the field layout mesh tooling expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: UnixSeconds,
    pub sender: String,
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub channel_idx: Option<u32>,
    pub pubkey_prefix: Option<String>,
    /// Passthrough device fields such as `sender_timestamp` or `SNR`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Build the enriched record for a message and its raw device payload.
    ///
    /// The sender/name pair is never empty: an explicit raw `name` wins,
    /// then the channel name, then the resolved sender name, then a label
    /// synthesized from the channel index or key prefix.
    pub fn from_message(message: &Message, raw: &Map<String, Value>, now: UnixSeconds) -> Self {
        let raw_str = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|value| !value.is_empty())
        };

        let (sender, name) = if let Some(name) = raw_str("name") {
            (raw_str("sender").unwrap_or_else(|| name.clone()), name)
        } else {
            let label = match message.direction {
                Direction::Outbound => message.enrichment.sender_name.clone(),
                Direction::Inbound => message
                    .enrichment
                    .channel_name
                    .clone()
                    .or_else(|| message.enrichment.sender_name.clone()),
            };
            let label = label.unwrap_or_else(|| synthesized_label(message));
            (label.clone(), label)
        };

        let extra = raw
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            timestamp: raw
                .get("timestamp")
                .and_then(Value::as_i64)
                .or(message.timestamp)
                .unwrap_or(now),
            sender,
            name,
            text: message.text.clone(),
            kind: message.kind,
            channel_idx: message.channel_idx,
            pubkey_prefix: message.pubkey_prefix.as_ref().map(ToString::to_string),
            extra,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            MessageKind::Channel => "CHAN",
            MessageKind::Private => "PRIV",
        }
    }
}

fn synthesized_label(message: &Message) -> String {
    match (message.kind, message.channel_idx, &message.pubkey_prefix) {
        (MessageKind::Channel, Some(idx), _) => format!("channel {idx}"),
        (_, _, Some(prefix)) => prefix.to_string(),
        _ => "unknown".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Sinks
// ----------------------------------------------------------------------------

/// Destination for log records
pub trait RecordSink: Send {
    /// Short label for diagnostics
    fn label(&self) -> String;
    fn write(&mut self, record: &LogRecord) -> Result<(), PersistenceError>;
}

/// Append-only file with one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| PersistenceError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self { path, file })
    }
}

impl RecordSink for JsonLinesSink {
    fn label(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{line}")
            .and_then(|_| self.file.flush())
            .map_err(|source| PersistenceError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// `msgs` table in a SQLite database, created if absent
pub struct SqliteSink {
    path: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for SqliteSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSink").field("path", &self.path).finish()
    }
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { path, conn })
    }
}

impl RecordSink for SqliteSink {
    fn label(&self) -> String {
        format!("database {}", self.path.display())
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), PersistenceError> {
        let raw_json = serde_json::to_string(record)?;
        self.conn.execute(
            INSERT_ROW,
            params![
                record.timestamp,
                record.sender,
                record.name,
                record.text,
                record.kind_str(),
                record.channel_idx,
                record.pubkey_prefix,
                raw_json,
            ],
        )?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Persistence Sink
// ----------------------------------------------------------------------------

/// Fan-out over the configured sinks
pub struct PersistenceSink {
    sinks: Vec<Box<dyn RecordSink>>,
    clock: Arc<dyn TimeSource>,
}

impl std::fmt::Debug for PersistenceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<String> = self.sinks.iter().map(|sink| sink.label()).collect();
        f.debug_struct("PersistenceSink").field("sinks", &labels).finish()
    }
}

impl PersistenceSink {
    /// Sink with nothing attached; `record` is then a no-op
    pub fn disabled(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            sinks: Vec::new(),
            clock,
        }
    }

    /// Open whichever logs are configured. Logs that fail to open are
    /// skipped and their errors returned alongside the sink.
    pub fn from_paths(
        log_file: Option<&Path>,
        log_db: Option<&Path>,
        clock: Arc<dyn TimeSource>,
    ) -> (Self, Vec<PersistenceError>) {
        let mut sink = Self::disabled(clock);
        let mut errors = Vec::new();

        if let Some(path) = log_file {
            match JsonLinesSink::open(path) {
                Ok(file) => sink.add(Box::new(file)),
                Err(e) => errors.push(e),
            }
        }
        if let Some(path) = log_db {
            match SqliteSink::open(path) {
                Ok(db) => sink.add(Box::new(db)),
                Err(e) => errors.push(e),
            }
        }
        (sink, errors)
    }

    pub fn add(&mut self, sink: Box<dyn RecordSink>) {
        debug!("Message log attached: {}", sink.label());
        self.sinks.push(sink);
    }

    /// Write one message to every sink, collecting failures
    pub fn record(&mut self, message: &Message, raw: &Map<String, Value>) -> Vec<PersistenceError> {
        if self.sinks.is_empty() {
            return Vec::new();
        }
        let record = LogRecord::from_message(message, raw, self.clock.now());
        self.sinks
            .iter_mut()
            .filter_map(|sink| match sink.write(&record) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Failed to write message to {}: {}", sink.label(), e);
                    Some(e)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextId, Enrichment, KeyPrefix};

    fn channel_message(channel_name: Option<&str>) -> Message {
        Message {
            context: ContextId::Channel(3),
            direction: Direction::Inbound,
            display_sender: channel_name.map(str::to_string),
            text: "hello".to_string(),
            timestamp: Some(1000),
            kind: MessageKind::Channel,
            channel_idx: Some(3),
            pubkey_prefix: None,
            enrichment: Enrichment {
                channel_name: channel_name.map(str::to_string),
                sender_name: None,
            },
        }
    }

    #[test]
    fn test_channel_name_enrichment() {
        let record = LogRecord::from_message(&channel_message(Some("General")), &Map::new(), 0);
        assert_eq!(record.sender, "General");
        assert_eq!(record.name, "General");
    }

    #[test]
    fn test_synthesized_labels() {
        let record = LogRecord::from_message(&channel_message(None), &Map::new(), 0);
        assert_eq!(record.sender, "channel 3");

        let mut dm = channel_message(None);
        dm.kind = MessageKind::Private;
        dm.channel_idx = None;
        dm.pubkey_prefix = Some(KeyPrefix::new("abcdef012345"));
        let record = LogRecord::from_message(&dm, &Map::new(), 0);
        assert_eq!(record.name, "abcdef012345");
    }

    #[test]
    fn test_explicit_name_wins_and_internal_keys_stripped() {
        let raw: Map<String, Value> = serde_json::from_str(
            r#"{"name":"Base","context_type":"channel","channel_name":"x","SNR":6,"timestamp":77}"#,
        )
        .unwrap();
        let record = LogRecord::from_message(&channel_message(Some("General")), &raw, 0);
        assert_eq!(record.name, "Base");
        assert_eq!(record.sender, "Base");
        assert_eq!(record.timestamp, 77);
        assert!(record.extra.contains_key("SNR"));
        assert!(!record.extra.contains_key("context_type"));
        assert!(!record.extra.contains_key("channel_name"));
    }

    #[test]
    fn test_serialized_layout() {
        let record = LogRecord::from_message(&channel_message(Some("General")), &Map::new(), 0);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "CHAN");
        assert_eq!(value["channel_idx"], 3);
        assert_eq!(value["pubkey_prefix"], Value::Null);
    }

    #[test]
    fn test_missing_timestamp_uses_clock() {
        let mut message = channel_message(None);
        message.timestamp = None;
        let record = LogRecord::from_message(&message, &Map::new(), 555);
        assert_eq!(record.timestamp, 555);
    }
}
