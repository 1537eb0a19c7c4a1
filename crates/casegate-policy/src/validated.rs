//! # Validated Policies
//!
//! [`ValidatedPolicy`] is the only form of policy that can be registered,
//! activated, or evaluated. Construction parses every condition, checks
//! the voting configuration and state machine, and sorts the rules.

use std::collections::BTreeSet;

use casegate_core::{ContentDigest, PolicyId};
use casegate_ensemble::EnsembleEngine;

use crate::condition::Condition;
use crate::error::PolicyError;
use crate::policy::{Policy, PolicyRule};
use crate::state_machine::StateMachineDefinition;

/// A rule with its parsed condition.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: PolicyRule,
    pub condition: Condition,
}

/// An immutable, fully checked policy.
#[derive(Debug, Clone)]
pub struct ValidatedPolicy {
    policy: Policy,
    /// Ascending priority.
    rules: Vec<CompiledRule>,
    engine: EnsembleEngine,
    digest: ContentDigest,
}

impl ValidatedPolicy {
    /// Validate a policy document.
    pub fn new(policy: Policy) -> Result<Self, PolicyError> {
        let id = policy.policy_id.to_string();
        let invalid = |reason: String| PolicyError::Invalid {
            policy_id: id.clone(),
            reason,
        };

        if policy.policy_id.as_str().trim().is_empty() {
            return Err(invalid("policy_id is empty".into()));
        }
        if policy.vertical.trim().is_empty() {
            return Err(invalid("vertical is empty".into()));
        }
        if policy.rules.is_empty() {
            return Err(invalid("policy has no rules".into()));
        }

        let mut priorities = BTreeSet::new();
        let mut names = BTreeSet::new();
        for rule in &policy.rules {
            if !priorities.insert(rule.priority) {
                return Err(invalid(format!("duplicate rule priority {}", rule.priority)));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(invalid(format!("duplicate rule name '{}'", rule.name)));
            }
        }

        let engine = EnsembleEngine::new(policy.voting_strategy.clone()).map_err(|source| {
            PolicyError::Voting {
                policy_id: id.clone(),
                source,
            }
        })?;

        let problems = policy.state_machine.problems();
        if !problems.is_empty() {
            return Err(invalid(format!("state machine: {}", problems.join("; "))));
        }

        let mut rules = policy
            .rules
            .iter()
            .map(|rule| {
                Condition::parse(&rule.condition)
                    .map(|condition| CompiledRule {
                        rule: rule.clone(),
                        condition,
                    })
                    .map_err(|source| PolicyError::Condition {
                        policy_id: id.clone(),
                        rule: rule.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rules.sort_by_key(|r| r.rule.priority);

        match rules.iter().position(|r| r.condition.is_wildcard()) {
            None => tracing::warn!(
                policy_id = %policy.policy_id,
                "policy has no wildcard default rule; unmatched cases will fail evaluation"
            ),
            Some(idx) if idx + 1 != rules.len() => tracing::warn!(
                policy_id = %policy.policy_id,
                rule = %rules[idx].rule.name,
                "wildcard rule is not the last rule; later rules are unreachable"
            ),
            Some(_) => {}
        }

        let digest = policy.content_digest()?;
        Ok(Self {
            policy,
            rules,
            engine,
            digest,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn policy_id(&self) -> &PolicyId {
        &self.policy.policy_id
    }

    pub fn vertical(&self) -> &str {
        &self.policy.vertical
    }

    /// Compiled rules in evaluation order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn ensemble_engine(&self) -> &EnsembleEngine {
        &self.engine
    }

    pub fn state_machine(&self) -> &StateMachineDefinition {
        &self.policy.state_machine
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Whether the last rule is an unconditional default.
    pub fn has_default_rule(&self) -> bool {
        self.rules.last().is_some_and(|r| r.condition.is_wildcard())
    }
}

impl TryFrom<Policy> for ValidatedPolicy {
    type Error = PolicyError;

    fn try_from(policy: Policy) -> Result<Self, Self::Error> {
        Self::new(policy)
    }
}
