//! Error types for state synchronization.

use crate::types::HandleId;
use thiserror::Error;

/// Main error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A relay arrived from a handle that never registered.
    #[error("Handle not registered: {0}")]
    Registration(HandleId),

    #[error("Malformed action from {handle}: {reason}")]
    MalformedAction { handle: HandleId, reason: String },

    #[error("Malformed registration from {handle}: {reason}")]
    MalformedRegistration { handle: HandleId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Why a message could not be handed to a subordinate connection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The other end is gone (closed, crashed or destroyed).
    #[error("connection {0} is disconnected")]
    Disconnected(HandleId),

    /// The transport queue is full; the message was dropped.
    #[error("connection {0} queue is full")]
    Full(HandleId),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
