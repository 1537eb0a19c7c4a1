//! # Policy Documents
//!
//! The serde model of an authored policy and its YAML/JSON loaders.
//! A [`Policy`] is untrusted input until it has been turned into a
//! [`ValidatedPolicy`](crate::ValidatedPolicy).

use casegate_core::{sha256_digest, ActionType, CanonicalBytes, ContentDigest, PolicyId};
use casegate_ensemble::VotingStrategyConfig;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::state_machine::StateMachineDefinition;

/// A single ordered rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Evaluation order, ascending. Unique within a policy.
    pub priority: u32,
    /// Unique within a policy; used as the key when diffing.
    pub name: String,
    pub condition: String,
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
}

/// A versioned policy for one vertical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: PolicyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vertical: String,
    pub version: String,
    /// Request activation on registration.
    #[serde(default)]
    pub active: bool,
    pub voting_strategy: VotingStrategyConfig,
    pub rules: Vec<PolicyRule>,
    pub state_machine: StateMachineDefinition,
}

impl Policy {
    pub fn from_yaml_str(s: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Content digest of the document, ignoring the `active` flag.
    ///
    /// Two registrations under one `policy_id` are the same policy iff
    /// their digests match.
    pub fn content_digest(&self) -> Result<ContentDigest, PolicyError> {
        let mut normalized = self.clone();
        normalized.active = false;
        let bytes = CanonicalBytes::new(&normalized)?;
        Ok(sha256_digest(&bytes))
    }

    /// Rules in evaluation order.
    pub fn rules_by_priority(&self) -> Vec<&PolicyRule> {
        let mut rules: Vec<&PolicyRule> = self.rules.iter().collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}
