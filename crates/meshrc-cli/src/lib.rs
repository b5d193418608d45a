//! meshrc CLI library
//!
//! Command-line surface, configuration, the device connector and the terminal
//! UI for the meshrc chat client.

pub mod cli;
pub mod config;
pub mod connector;
pub mod error;
#[cfg(feature = "tui")]
pub mod tui;

pub use cli::Cli;
pub use config::AppConfig;
pub use connector::DeviceConnector;
pub use error::{CliError, Result};
