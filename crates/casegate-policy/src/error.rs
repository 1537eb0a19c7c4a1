//! # Policy Errors

use casegate_core::{CoreError, PolicyId};
use casegate_ensemble::EnsembleError;
use thiserror::Error;

/// A condition string that does not parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed condition {condition:?} at offset {position}: {message}")]
pub struct ConditionParseError {
    pub condition: String,
    /// Byte offset into `condition`.
    pub position: usize,
    pub message: String,
}

/// Errors loading, validating, or registering a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Structural problem with the document.
    #[error("policy '{policy_id}' is invalid: {reason}")]
    Invalid { policy_id: String, reason: String },

    /// A rule condition failed to parse.
    #[error("rule '{rule}' of policy '{policy_id}' has a malformed condition")]
    Condition {
        policy_id: String,
        rule: String,
        #[source]
        source: ConditionParseError,
    },

    /// The voting-strategy block is inconsistent.
    #[error("policy '{policy_id}' has an invalid voting strategy")]
    Voting {
        policy_id: String,
        #[source]
        source: EnsembleError,
    },

    /// A different document was registered under an existing id.
    #[error(
        "policy '{0}' is already registered with different content; publish a new version instead"
    )]
    Immutable(PolicyId),

    #[error("policy '{0}' is not registered")]
    UnknownPolicy(PolicyId),

    #[error("no active policy for vertical '{0}'")]
    NoActivePolicy(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors raised while evaluating rules against a live case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// No rule matched. The policy lacks a default rule.
    #[error(
        "no rule of policy '{policy_id}' matched ({rules_evaluated} rules evaluated); \
         the policy lacks a default rule"
    )]
    NoRuleMatch {
        policy_id: PolicyId,
        rules_evaluated: usize,
    },
}
