//! Error types for rtnsim

use thiserror::Error;

/// Error types for the rtnsim library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Scheduler state machine errors.
    #[error("State machine error: {0}")]
    StateMachine(String),
}
