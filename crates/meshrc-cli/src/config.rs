//! meshrc CLI Configuration Management
//!
//! Configuration is read from a TOML file and then overridden by command-line
//! flags. The file is taken from `--config` when given, otherwise from
//! `<config dir>/meshrc/config.toml` when that exists. Missing sections and
//! keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use meshrc_core::gateway::{DEFAULT_BAUDRATE, DEFAULT_TCP_PORT};
use meshrc_core::{DisplayZone, EngineConfig, KeyPrefix};

use crate::cli::Cli;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
    pub transport: TransportDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Sender label for own messages until the device reports its name
    pub name: String,
}

/// Message logs and the diagnostic log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only JSON-lines message log
    pub log_file: Option<PathBuf>,
    /// SQLite database receiving the `msgs` table
    pub log_db: Option<PathBuf>,
    /// Diagnostic tracing output while the terminal UI is running
    pub debug_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    /// Contact key prefixes starred at startup
    pub favorites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportDefaults {
    pub baudrate: u32,
    pub tcp_port: u16,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: meshrc_core::commands::DEFAULT_IDENTITY.to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 50,
            favorites: Vec::new(),
        }
    }
}

impl Default for TransportDefaults {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
            tcp_port: DEFAULT_TCP_PORT,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load from an explicit path, else the default location, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(path);
        }

        match Self::default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            _ => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AppConfig = toml::from_str(&contents).map_err(|e| {
            ConfigError::Loading(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/meshrc/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meshrc").join("config.toml"))
    }

    /// Command-line flags win over file values
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(name) = &cli.name {
            self.identity.name = name.clone();
        }
        if let Some(path) = &cli.log {
            self.logging.log_file = Some(path.clone());
        }
        if let Some(path) = &cli.log_db {
            self.logging.log_db = Some(path.clone());
        }
        if let Some(path) = &cli.debug_log {
            self.logging.debug_log = Some(path.clone());
        }
        if let Some(baudrate) = cli.baudrate {
            self.transport.baudrate = baudrate;
        }
        if let Some(port) = cli.port {
            self.transport.tcp_port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ui.tick_rate_ms == 0 {
            return Err(ConfigError::Validation(
                "Tick rate must be greater than 0".to_string(),
            ));
        }
        if self.transport.baudrate == 0 {
            return Err(ConfigError::Validation(
                "Baud rate must be greater than 0".to_string(),
            ));
        }
        if self.transport.tcp_port == 0 {
            return Err(ConfigError::Validation(
                "TCP port must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            local_identity: self.identity.name.clone(),
            zone: DisplayZone::Local,
            favorites: self
                .ui
                .favorites
                .iter()
                .map(|prefix| KeyPrefix::new(prefix))
                .collect(),
            ..EngineConfig::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.identity.name, "Me");
        assert_eq!(config.transport.baudrate, 115_200);
        assert_eq!(config.transport.tcp_port, 4403);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlog_file = \"/tmp/msgs.jsonl\"\n\n[ui]\nfavorites = [\"A1B2C3D4E5F6\"]").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.logging.log_file, Some(PathBuf::from("/tmp/msgs.jsonl")));
        assert_eq!(config.ui.tick_rate_ms, 50);
        assert_eq!(config.identity.name, "Me");
        assert_eq!(
            config.engine_config().favorites,
            vec![KeyPrefix::new("a1b2c3d4e5f6")]
        );
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.ui.tick_rate_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.tcp_port = 0;
        assert!(config.validate().is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\nbaudrate = 0").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_a_loading_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ui\ntick_rate_ms = ").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(file.path()),
            Err(ConfigError::Loading(_))
        ));
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = AppConfig::default();
        config.identity.name = "FromFile".to_string();
        let cli = Cli::parse_from([
            "meshrc", "-t", "localhost", "-p", "5000", "--name", "FromFlag", "--log-db", "x.db",
        ]);
        config.apply_overrides(&cli);
        assert_eq!(config.identity.name, "FromFlag");
        assert_eq!(config.transport.tcp_port, 5000);
        assert_eq!(config.logging.log_db, Some(PathBuf::from("x.db")));
        assert_eq!(config.logging.log_file, None);
    }
}
