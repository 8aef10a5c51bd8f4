//! Error types shared across Nudge crates.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NudgeError>;

/// Unified error type.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Configuration load or parse failure.
    #[error("config error: {0}")]
    Config(String),

    /// Store read/write failure. Surfaced to the immediate caller.
    #[error("store error: {0}")]
    Store(String),

    /// Messaging-session failure (direct or channel send).
    #[error("channel error: {0}")]
    Channel(String),

    /// Webhook endpoint dispatch failure.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
