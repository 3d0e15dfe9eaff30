//! # Error Types
//!
//! Custom error types for Woabot using `thiserror`.

use thiserror::Error;

/// Main error type for Woabot
#[derive(Debug, Error)]
pub enum WoabotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input device errors (open, read, short record)
    #[error("Controller error: {0}")]
    Controller(String),

    /// No supported controller was found during discovery
    #[error("No supported controller found")]
    ControllerNotFound,

    /// A motor channel rejected a command
    #[error("Motor channel {channel} rejected command: {reason}")]
    Actuator { channel: u32, reason: String },

    /// The motor controller library could not be loaded or is unavailable
    #[error("Motor backend error: {0}")]
    MotorBackend(String),

    /// A command was issued to a motor channel that is not attached
    #[error("Motor channel {channel} is not attached")]
    NotAttached { channel: u32 },

    /// A retry loop observed the terminate flag before the command was acknowledged
    #[error("Command cancelled by terminate request")]
    Cancelled,

    /// A bounded retry loop gave up
    #[error("Command not acknowledged after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The log sink could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Motors could not be brought to a safe state on exit
    #[error("Motor teardown failed: {0}")]
    Teardown(String),
}

/// Result type alias for Woabot
pub type Result<T> = std::result::Result<T, WoabotError>;
