//! # Policy Diff
//!
//! Structural comparison of two policies' rule sets, keyed by rule name.

use std::collections::BTreeMap;

use casegate_core::PolicyId;
use serde::{Deserialize, Serialize};

use crate::policy::{Policy, PolicyRule};

/// A rule present in both policies with differing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChange {
    pub rule_name: String,
    /// Field names, e.g. `["condition", "action"]`.
    pub changed_fields: Vec<String>,
}

/// What changed from one policy to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDiff {
    pub from_policy: PolicyId,
    pub to_policy: PolicyId,
    pub rules_added: Vec<String>,
    pub rules_removed: Vec<String>,
    pub rules_modified: Vec<RuleChange>,
    pub voting_strategy_changed: bool,
    pub state_machine_changed: bool,
}

impl PolicyDiff {
    pub fn between(from: &Policy, to: &Policy) -> Self {
        let old: BTreeMap<&str, &PolicyRule> =
            from.rules.iter().map(|r| (r.name.as_str(), r)).collect();
        let new: BTreeMap<&str, &PolicyRule> =
            to.rules.iter().map(|r| (r.name.as_str(), r)).collect();

        let rules_added = new
            .keys()
            .filter(|name| !old.contains_key(*name))
            .map(|name| name.to_string())
            .collect();
        let rules_removed = old
            .keys()
            .filter(|name| !new.contains_key(*name))
            .map(|name| name.to_string())
            .collect();
        let rules_modified = old
            .iter()
            .filter_map(|(name, before)| {
                let after = new.get(name)?;
                let changed_fields = changed_fields(before, after);
                (!changed_fields.is_empty()).then(|| RuleChange {
                    rule_name: name.to_string(),
                    changed_fields,
                })
            })
            .collect();

        Self {
            from_policy: from.policy_id.clone(),
            to_policy: to.policy_id.clone(),
            rules_added,
            rules_removed,
            rules_modified,
            voting_strategy_changed: from.voting_strategy != to.voting_strategy,
            state_machine_changed: from.state_machine != to.state_machine,
        }
    }

    /// Whether the two policies decide identically by construction.
    pub fn is_empty(&self) -> bool {
        self.rules_added.is_empty()
            && self.rules_removed.is_empty()
            && self.rules_modified.is_empty()
            && !self.voting_strategy_changed
            && !self.state_machine_changed
    }
}

fn changed_fields(a: &PolicyRule, b: &PolicyRule) -> Vec<String> {
    let mut fields = Vec::new();
    if a.priority != b.priority {
        fields.push("priority");
    }
    if a.condition.trim() != b.condition.trim() {
        fields.push("condition");
    }
    if a.action != b.action {
        fields.push("action");
    }
    if a.assignee_role != b.assignee_role {
        fields.push("assignee_role");
    }
    if a.sla_hours != b.sla_hours {
        fields.push("sla_hours");
    }
    fields.into_iter().map(String::from).collect()
}
