//! # State Errors

use casegate_audit::AuditError;
use casegate_core::{ActionType, CaseId, CaseStatus, Timestamp};
use casegate_ensemble::EnsembleError;
use casegate_policy::{EvaluationError, PolicyError};
use thiserror::Error;

/// Errors raised by the transition controller.
#[derive(Error, Debug)]
pub enum TransitionError {
    /// The policy's transition table does not allow the request. The case
    /// is unchanged.
    #[error("case {case_id}: transition {from} -> {to} not allowed for role '{role}': {reason}")]
    InvalidTransition {
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
        role: String,
        reason: String,
    },

    /// Another operation holds the case, or the caller's view of the case
    /// is stale. Refetch and retry.
    #[error("case {case_id}: concurrent transition conflict: {detail}")]
    ConcurrentTransitionConflict { case_id: CaseId, detail: String },

    #[error("case {0} not found")]
    CaseNotFound(CaseId),

    #[error("case {0} already exists")]
    CaseExists(CaseId),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The audit append failed; the case is unchanged.
    #[error("audit store rejected the event: {0}")]
    Audit(#[from] AuditError),
}

impl TransitionError {
    /// Whether retrying against a refreshed case may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentTransitionConflict { .. })
    }
}

/// Errors raised by the decision pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("ensemble synthesis failed: {0}")]
    Ensemble(#[from] EnsembleError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    /// A reviewer decision that has no terminal or info-request mapping.
    #[error("'{0}' is not a review decision (expected approve, reject, or request_more_info)")]
    InvalidReviewAction(ActionType),

    /// Expiry was requested before the SLA deadline passed.
    #[error("case {case_id}: SLA not breached (deadline: {deadline:?})")]
    SlaNotBreached {
        case_id: CaseId,
        deadline: Option<Timestamp>,
    },

    #[error("invalid engine configuration: {0}")]
    Config(String),
}
