//! Error types for the hub.

use crate::types::{ParticipantId, Sequence};
use thiserror::Error;

/// Main error type for hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Participant not joined to any hub: {0}")]
    NotJoined(ParticipantId),

    #[error("Identity already taken by another member: {0}")]
    IdentityTaken(ParticipantId),

    #[error("Message {sequence} reached only part of the room: {} delivery failure(s)", failures.len())]
    PartialDelivery {
        sequence: Sequence,
        failures: Vec<DeliveryFailure>,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::Config(e.to_string())
    }
}

/// Error returned by a participant's receive path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("inbox full")]
    Full,

    #[error("inbox disconnected")]
    Disconnected,

    #[error("{0}")]
    Rejected(String),
}

/// One member that failed to take a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryFailure {
    pub recipient: ParticipantId,
    pub reason: String,
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
