//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use meshrc_core::TransportConfig;

use crate::config::TransportDefaults;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("transport")
        .args(["serial", "target", "address"])
        .multiple(false)
))]
pub struct Cli {
    /// Serial port of the companion device
    #[arg(short, long)]
    pub serial: Option<String>,

    /// Baud rate for the serial link
    #[arg(short, long, requires = "serial")]
    pub baudrate: Option<u32>,

    /// Host name or IP address of a networked device
    #[arg(short, long)]
    pub target: Option<String>,

    /// TCP port of a networked device
    #[arg(short, long, requires = "target")]
    pub port: Option<u16>,

    /// Bluetooth address of the device
    #[arg(short, long)]
    pub address: Option<String>,

    /// Append received and sent messages to a JSON-lines file
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Store received and sent messages in a SQLite database
    #[arg(long)]
    pub log_db: Option<PathBuf>,

    /// Write diagnostic output to this file
    #[arg(long)]
    pub debug_log: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Display name for own messages when the device reports none
    #[arg(short, long)]
    pub name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The selected link, with unset numbers taken from the defaults
    pub fn transport(&self, defaults: &TransportDefaults) -> Option<TransportConfig> {
        if let Some(port) = &self.serial {
            return Some(TransportConfig::Serial {
                port: port.clone(),
                baudrate: self.baudrate.unwrap_or(defaults.baudrate),
            });
        }
        if let Some(host) = &self.target {
            return Some(TransportConfig::Tcp {
                host: host.clone(),
                port: self.port.unwrap_or(defaults.tcp_port),
            });
        }
        self.address.as_ref().map(|address| TransportConfig::Ble {
            address: address.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_uses_default_baudrate() {
        let cli = Cli::parse_from(["meshrc", "-s", "/dev/ttyUSB0"]);
        assert_eq!(
            cli.transport(&TransportDefaults::default()),
            Some(TransportConfig::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baudrate: 115_200
            })
        );
    }

    #[test]
    fn test_tcp_port_override() {
        let cli = Cli::parse_from(["meshrc", "-t", "10.0.0.2", "-p", "5000"]);
        assert_eq!(
            cli.transport(&TransportDefaults::default()),
            Some(TransportConfig::Tcp {
                host: "10.0.0.2".to_string(),
                port: 5000
            })
        );
    }

    #[test]
    fn test_no_transport_selected() {
        let cli = Cli::parse_from(["meshrc", "--log", "msgs.jsonl"]);
        assert_eq!(cli.transport(&TransportDefaults::default()), None);
        assert_eq!(cli.log, Some(PathBuf::from("msgs.jsonl")));
    }

    #[test]
    fn test_only_one_transport_allowed() {
        let result = Cli::try_parse_from(["meshrc", "-s", "/dev/ttyUSB0", "-a", "AA:BB"]);
        assert!(result.is_err());
    }
}
