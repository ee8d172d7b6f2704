//! Error types for the device-grant application.

use thiserror::Error;

use crate::auth::AuthError;

/// Top-level error for configuration, startup and flow operations.
#[derive(Error, Debug)]
pub enum DeviceGrantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl DeviceGrantError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::ConfigFile(_) => 2,
            _ => 1,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DeviceGrantError>;
