//! Error types for session orchestration.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::channel::ChannelError;
use crate::relay::RelayError;

/// Errors that can occur while driving a sharing session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// The secure channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The relay transport failed.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// No key exchange has been established yet.
    #[error("session not established")]
    NotEstablished,

    /// The session already has an open channel.
    #[error("session already attached to a transport")]
    AlreadyAttached,
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
