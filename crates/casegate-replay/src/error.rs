//! # Replay Errors

use casegate_audit::AuditError;
use casegate_core::CaseId;
use casegate_policy::{EvaluationError, PolicyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("case {0} has no audit history")]
    CaseNotFound(CaseId),

    /// The case was never decided automatically, so there is no recorded
    /// ensemble decision to replay.
    #[error("case {0} has no recorded automated decision")]
    NoDecision(CaseId),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The alternate policy matched no rule for this case.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
