//! Transition error types

use crate::state::{TransitionId, TransitionState};
use thiserror::Error;

/// Errors raised synchronously by the scheduling API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    /// No record with this id exists on the target
    #[error("transition {id} not found")]
    NotFound { id: TransitionId },

    /// The record has moved past the state window the call requires
    #[error("too late; transition {id} is already {state}")]
    ConfigurationTooLate {
        id: TransitionId,
        state: TransitionState,
    },

    /// A supplied callback cannot be used where one is required
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// A listener was registered for an event the scheduler never emits
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

/// Result type for transition operations
pub type Result<T> = std::result::Result<T, TransitionError>;
