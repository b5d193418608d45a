//! Error handling for the meshrc CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("meshrc core error: {0}")]
    Core(#[from] meshrc_core::MeshrcError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] meshrc_core::GatewayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("UI error: {0}")]
    UI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::UI(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(path: &std::path::Path) -> Result<AppConfig> {
        Ok(AppConfig::load(Some(path))?)
    }

    #[test]
    fn test_malformed_toml_surfaces_as_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[identity]\nname = ").unwrap();

        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Loading(_))));
        let message = err.to_string();
        assert!(message.starts_with("Configuration error: Configuration loading error: Failed to parse"));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_anyhow_context_is_kept() {
        let err: CliError = anyhow::anyhow!("raw mode").context("Failed to start").into();
        assert_eq!(err.to_string(), "UI error: Failed to start: raw mode");
    }
}
