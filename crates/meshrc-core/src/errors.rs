//! Error types for the meshrc core
//!
//! Three families: [`GatewayError`] for failures reported by the device
//! gateway, [`PersistenceError`] for message log writes, and [`MeshrcError`]
//! which is the taxonomy surfaced to the user. None of these are fatal; the
//! engine turns each one into a [`Notification`](crate::engine::Notification)
//! and keeps processing.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Severity
// ----------------------------------------------------------------------------

/// How loudly a notification should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

// ----------------------------------------------------------------------------
// Gateway Errors
// ----------------------------------------------------------------------------

/// Failures reported by the device gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Transport {transport} is not available: {reason}")]
    Unavailable { transport: String, reason: String },
    #[error("Device disconnected")]
    Disconnected,
    #[error("Device rejected the request: {0}")]
    Rejected(String),
    #[error("Device did not answer within {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Not found: {0}")]
    NotFound(String),
}

// ----------------------------------------------------------------------------
// Persistence Errors
// ----------------------------------------------------------------------------

/// Failures writing to one of the message logs
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Log file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Log table: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Log record serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// User-facing error taxonomy
#[derive(Debug, Error)]
pub enum MeshrcError {
    #[error("Connection error: {0}")]
    Connection(#[source] GatewayError),

    #[error("{usage}")]
    CommandPrecondition { command: String, usage: String },

    #[error("Unknown command: /{0}")]
    UnknownCommand(String),

    #[error("No recipient selected")]
    NoActiveContext,

    #[error("Failed to send: {0}")]
    SendFailure(#[source] GatewayError),

    #[error("Command /{command} failed: {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: GatewayError,
    },

    #[error("Logging failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl MeshrcError {
    /// Create a precondition error carrying the usage line shown to the user
    pub fn precondition(command: impl Into<String>, usage: impl Into<String>) -> Self {
        Self::CommandPrecondition {
            command: command.into(),
            usage: usage.into(),
        }
    }

    /// Severity used when the error is shown as a notification
    pub fn severity(&self) -> Severity {
        match self {
            Self::CommandPrecondition { .. } | Self::NoActiveContext => Severity::Warning,
            Self::Connection(_)
            | Self::UnknownCommand(_)
            | Self::SendFailure(_)
            | Self::CommandFailed { .. }
            | Self::Persistence(_) => Severity::Error,
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, MeshrcError>;
