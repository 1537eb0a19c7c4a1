//! # State-Machine Definitions
//!
//! The legal transition graph of a policy. Source states are
//! [`StatePattern`]s (`draft`, `under_review.*`, `*`); targets are always
//! concrete states.
//!
//! A transition `from → to` by a role is legal iff `from` is not terminal
//! and some entry matches `from`, targets `to`, and lists the role.

use std::collections::BTreeSet;

use casegate_core::{CaseStatus, StatePattern};
use serde::{Deserialize, Serialize};

/// One entry of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: StatePattern,
    pub to: CaseStatus,
    pub allowed_roles: BTreeSet<String>,
}

/// Why a transition request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDenial {
    /// The current state accepts no outbound transitions.
    TerminalState,
    /// No entry connects the two states.
    NoRoute,
    /// Entries exist, but none lists the actor's role.
    RoleNotPermitted { allowed_roles: BTreeSet<String> },
}

impl std::fmt::Display for TransitionDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TerminalState => f.write_str("current state is terminal"),
            Self::NoRoute => f.write_str("no transition-table entry connects these states"),
            Self::RoleNotPermitted { allowed_roles } => {
                let roles: Vec<&str> = allowed_roles.iter().map(String::as_str).collect();
                write!(f, "role not permitted (allowed: {})", roles.join(", "))
            }
        }
    }
}

/// States, transition table, and terminal states of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub states: Vec<CaseStatus>,
    pub transitions: Vec<TransitionRule>,
    #[serde(default)]
    pub terminal_states: Vec<CaseStatus>,
}

impl StateMachineDefinition {
    /// Whether `status` accepts no outbound transitions. The built-in
    /// terminal states are always terminal.
    pub fn is_terminal(&self, status: &CaseStatus) -> bool {
        status.is_terminal() || self.terminal_states.contains(status)
    }

    /// Find the entry authorising `from → to` for `role`.
    pub fn check_transition(
        &self,
        from: &CaseStatus,
        to: &CaseStatus,
        role: &str,
    ) -> Result<&TransitionRule, TransitionDenial> {
        if self.is_terminal(from) {
            return Err(TransitionDenial::TerminalState);
        }
        let candidates: Vec<&TransitionRule> = self
            .transitions
            .iter()
            .filter(|t| t.to == *to && t.from.matches(from))
            .collect();
        if candidates.is_empty() {
            return Err(TransitionDenial::NoRoute);
        }
        candidates
            .iter()
            .copied()
            .find(|t| t.allowed_roles.contains(role))
            .ok_or_else(|| TransitionDenial::RoleNotPermitted {
                allowed_roles: candidates
                    .iter()
                    .flat_map(|t| t.allowed_roles.iter().cloned())
                    .collect(),
            })
    }

    /// Every state reachable from `from` in one step, for any role.
    pub fn targets_from(&self, from: &CaseStatus) -> BTreeSet<CaseStatus> {
        if self.is_terminal(from) {
            return BTreeSet::new();
        }
        self.transitions
            .iter()
            .filter(|t| t.from.matches(from))
            .map(|t| t.to)
            .collect()
    }

    /// Structural checks. Returns a list of problems, empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.states.is_empty() {
            problems.push("state machine declares no states".to_string());
        }
        let declared = |s: &CaseStatus| self.states.contains(s);

        for terminal in &self.terminal_states {
            if !declared(terminal) {
                problems.push(format!("terminal state '{terminal}' is not declared"));
            }
        }

        for (idx, t) in self.transitions.iter().enumerate() {
            if !declared(&t.to) {
                problems.push(format!("transition #{idx} targets undeclared state '{}'", t.to));
            }
            if t.allowed_roles.is_empty() {
                problems.push(format!(
                    "transition #{idx} ({} -> {}) allows no roles",
                    t.from, t.to
                ));
            }
            match t.from {
                StatePattern::Any => {}
                StatePattern::Exact(ref s) if !declared(s) => {
                    problems.push(format!("transition #{idx} starts from undeclared state '{s}'"));
                }
                StatePattern::DescendantsOf(_)
                    if !self.states.iter().any(|s| t.from.matches(s)) =>
                {
                    problems.push(format!(
                        "transition #{idx} pattern '{}' matches no declared state",
                        t.from
                    ));
                }
                _ => {}
            }
            if let StatePattern::Exact(ref s) = t.from {
                if self.is_terminal(s) {
                    problems.push(format!(
                        "transition #{idx} leaves terminal state '{s}'"
                    ));
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_core::ReviewStage;

    fn rule(from: &str, to: &str, roles: &[&str]) -> TransitionRule {
        TransitionRule {
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            allowed_roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn machine() -> StateMachineDefinition {
        StateMachineDefinition {
            states: CaseStatus::ALL.to_vec(),
            transitions: vec![
                rule("draft", "submitted", &["customer", "api"]),
                rule("submitted", "processing", &["system"]),
                rule("under_review.*", "approved", &["reviewer", "workflow_engine"]),
                rule("*", "expired", &["system"]),
            ],
            terminal_states: CaseStatus::TERMINAL.to_vec(),
        }
    }

    #[test]
    fn test_exact_transition() {
        let sm = machine();
        assert!(sm
            .check_transition(&CaseStatus::Draft, &CaseStatus::Submitted, "api")
            .is_ok());
        assert_eq!(
            sm.check_transition(&CaseStatus::Draft, &CaseStatus::Processing, "api"),
            Err(TransitionDenial::NoRoute)
        );
    }

    #[test]
    fn test_role_denied_lists_allowed_roles() {
        let sm = machine();
        let err = sm
            .check_transition(&CaseStatus::Draft, &CaseStatus::Submitted, "reviewer")
            .unwrap_err();
        match err {
            TransitionDenial::RoleNotPermitted { allowed_roles } => {
                assert!(allowed_roles.contains("customer"));
                assert!(allowed_roles.contains("api"));
            }
            other => panic!("unexpected denial {other:?}"),
        }
    }

    #[test]
    fn test_descendant_pattern() {
        let sm = machine();
        let fraud = CaseStatus::UnderReview(Some(ReviewStage::FraudCheck));
        assert!(sm
            .check_transition(&fraud, &CaseStatus::Approved, "reviewer")
            .is_ok());
        // `under_review.*` does not match the bare parent.
        assert_eq!(
            sm.check_transition(&CaseStatus::UnderReview(None), &CaseStatus::Approved, "reviewer"),
            Err(TransitionDenial::NoRoute)
        );
    }

    #[test]
    fn test_any_pattern_but_not_from_terminal() {
        let sm = machine();
        assert!(sm
            .check_transition(&CaseStatus::Processing, &CaseStatus::Expired, "system")
            .is_ok());
        assert_eq!(
            sm.check_transition(&CaseStatus::Approved, &CaseStatus::Expired, "system"),
            Err(TransitionDenial::TerminalState)
        );
    }

    #[test]
    fn test_targets_from() {
        let sm = machine();
        let targets = sm.targets_from(&CaseStatus::Draft);
        assert!(targets.contains(&CaseStatus::Submitted));
        assert!(targets.contains(&CaseStatus::Expired));
        assert!(sm.targets_from(&CaseStatus::Rejected).is_empty());
    }

    #[test]
    fn test_problems() {
        assert!(machine().problems().is_empty());
        let mut sm = machine();
        sm.states = vec![CaseStatus::Draft];
        sm.transitions.push(rule("approved", "draft", &[]));
        let problems = sm.problems();
        assert!(problems.iter().any(|p| p.contains("undeclared state 'submitted'")));
        assert!(problems.iter().any(|p| p.contains("allows no roles")));
        assert!(problems.iter().any(|p| p.contains("leaves terminal state 'approved'")));
        assert!(problems.iter().any(|p| p.contains("matches no declared state")));
    }

    #[test]
    fn test_yaml_shape() {
        let sm: StateMachineDefinition = serde_yaml::from_str(
            "states: [draft, submitted]\n\
             transitions:\n  - from: draft\n    to: submitted\n    allowed_roles: [api]\n",
        )
        .unwrap();
        assert_eq!(sm.transitions[0].from, StatePattern::Exact(CaseStatus::Draft));
        assert!(sm.terminal_states.is_empty());
    }
}
