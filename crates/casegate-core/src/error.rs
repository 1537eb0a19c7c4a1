//! # Error Types
//!
//! Leaf errors for the foundational types. Subsystem crates define their
//! own `thiserror` enums and wrap these where needed.

use thiserror::Error;

/// Errors raised by the foundational types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A dotted state name does not correspond to any known case state.
    #[error("unknown case state: {0:?}")]
    UnknownState(String),

    /// A transition-table source pattern is malformed.
    #[error("invalid state pattern {pattern:?}: {reason}")]
    InvalidStatePattern {
        /// The pattern as authored.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An action name is not part of the action vocabulary.
    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    /// A case identifier is not a UUID.
    #[error("invalid case id {0:?}")]
    InvalidCaseId(String),

    /// Timestamp parsing or construction failed.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    /// Canonical serialization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] serde_json::Error),
}
