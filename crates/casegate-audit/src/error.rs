//! # Audit Errors

use casegate_core::{CaseId, CoreError, Timestamp};
use thiserror::Error;

/// Errors from the audit store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    /// The append expected a different next sequence number; another
    /// writer got there first.
    #[error(
        "sequence conflict for {case_id}: expected to append #{expected}, log is at #{current}"
    )]
    SequenceConflict {
        case_id: CaseId,
        expected: u64,
        current: u64,
    },

    /// The event is timestamped before the last event of the case.
    #[error("event for {case_id} at {attempted} precedes last event at {last}")]
    OutOfOrderTimestamp {
        case_id: CaseId,
        last: Timestamp,
        attempted: Timestamp,
    },

    #[error("no audit history for {0}")]
    CaseNotFound(CaseId),

    /// The event sequence cannot be folded into a case.
    #[error("history of {case_id} cannot be replayed at event #{sequence}: {reason}")]
    CorruptHistory {
        case_id: CaseId,
        sequence: u64,
        reason: String,
    },

    /// The hash chain does not verify.
    #[error("audit chain of {case_id} broken at event #{sequence}: {reason}")]
    ChainBroken {
        case_id: CaseId,
        sequence: u64,
        reason: String,
    },

    /// The backing store could not be written.
    #[error("audit store unavailable: {0}")]
    Unavailable(String),

    #[error("audit digest computation failed: {0}")]
    Digest(String),
}

impl From<CoreError> for AuditError {
    fn from(err: CoreError) -> Self {
        Self::Digest(err.to_string())
    }
}
