//! Error types for the Hakari session core

use thiserror::Error;

/// Main error type for session operations
///
/// Expected user-input rejections (bad cycle count, busy in another
/// channel, leave without a session) are *not* errors — they are
/// ordinary control flow modeled by [`crate::reply::Rejection`]. Only
/// genuine faults live here.
#[derive(Debug, Error)]
pub enum HakariError {
    /// Voice transport error (joining, playing, or releasing a connection)
    #[error("Voice transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HakariError {
    /// Build a transport error from any displayable cause
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// Build a configuration error from any displayable cause
    pub fn config(cause: impl std::fmt::Display) -> Self {
        Self::Config(cause.to_string())
    }
}

/// Convenient Result type using HakariError
pub type Result<T> = std::result::Result<T, HakariError>;
