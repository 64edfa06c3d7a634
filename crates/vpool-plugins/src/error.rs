//! Plugin configuration errors.

use thiserror::Error;

/// Errors raised while registering plugins or validating a policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginError {
    #[error("unknown filter plugin: {0}")]
    UnknownFilter(String),

    #[error("unknown score plugin: {0}")]
    UnknownScore(String),

    #[error("plugin already registered: {0}")]
    Duplicate(String),

    #[error("invalid arguments for plugin {plugin}: {reason}")]
    InvalidArgs { plugin: String, reason: String },
}

pub type PluginResult<T> = Result<T, PluginError>;
