//! Error types for the conversation core.
//!
//! None of these cross the dispatcher boundary: the state machine logs and
//! absorbs them so a bad turn leaves the participant silent instead of
//! stalling the room.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for shout parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result alias for caller-supplied hooks.
pub type HookResult<T> = Result<T, HookError>;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result alias for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A control shout that could not be split into its parts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("mention has no body: {shout:?}")]
    EmptyMention { shout: String },

    #[error("missing delimiter {delimiter:?} in {shout:?}")]
    MissingDelimiter { delimiter: String, shout: String },

    #[error("empty {field} in {shout:?}")]
    EmptyField { field: &'static str, shout: String },
}

/// A hook the host application supplied failed.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("hook {hook} failed: {message}")]
    Failed { hook: &'static str, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn failed(hook: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            hook,
            message: message.into(),
        }
    }
}

/// Delivering a shout to the room failed.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport closed")]
    Closed,
}

/// Handing a shout to the serial worker failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("shout queue is full")]
    QueueFull,

    #[error("dispatcher has stopped")]
    Stopped,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Configuration could not be loaded or is invalid.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
