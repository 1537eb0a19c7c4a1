//! # Rule Evaluator
//!
//! First-match evaluation of a policy's rules against a case and its
//! ensemble decision. Rules run in ascending priority; the first whose
//! condition is true is the match and evaluation stops there. No default
//! is ever inserted: a policy with no matching rule is a governance
//! incident and surfaces as [`EvaluationError::NoRuleMatch`].
//!
//! ## Context Layout
//!
//! ```text
//! {
//!   "case":     { case_id, vertical, status, priority, policy_version, metadata },
//!   "ensemble": { action, confidence, risk_score, risk_flags, voting_strategy,
//!                 consensus_level, flag_override_applied },
//!   "evidence": { <type>: {...}, ... },
//!   "<type>":   {...}            each evidence type also at the top level
//! }
//! ```

use casegate_core::{ActionType, Case, EvidenceSnapshot};
use casegate_ensemble::EnsembleDecision;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::EvaluationError;
use crate::validated::ValidatedPolicy;

const RESERVED_ROOTS: [&str; 3] = ["case", "ensemble", "evidence"];

/// The outcome of evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_name: String,
    pub priority: u32,
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
}

/// Read-only JSON view of a case for condition evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext(Value);

impl EvaluationContext {
    pub fn new(case: &Case, decision: &EnsembleDecision, evidence: &EvidenceSnapshot) -> Self {
        let fin = &decision.final_recommendation;
        let mut root = Map::new();
        root.insert(
            "case".into(),
            json!({
                "case_id": case.case_id.to_string(),
                "vertical": case.vertical,
                "status": case.status.dotted(),
                "priority": case.priority.as_str(),
                "policy_version": case.policy_version.as_str(),
                "metadata": case.metadata,
            }),
        );
        root.insert(
            "ensemble".into(),
            json!({
                "action": fin.action.as_str(),
                "confidence": fin.confidence,
                "risk_score": fin.risk_score,
                "risk_flags": fin.risk_flags,
                "voting_strategy": decision.voting_strategy.as_str(),
                "consensus_level": fin.voting_details.consensus_level.as_str(),
                "flag_override_applied": fin.voting_details.flag_override_applied,
            }),
        );
        root.insert("evidence".into(), evidence.to_value());
        for (evidence_type, data) in evidence.iter() {
            if RESERVED_ROOTS.contains(&evidence_type.as_str()) {
                tracing::debug!(
                    evidence_type = %evidence_type,
                    "evidence type shadows a reserved namespace; reachable only under 'evidence'"
                );
                continue;
            }
            root.insert(evidence_type.clone(), data.clone());
        }
        Self(Value::Object(root))
    }

    /// Wrap an arbitrary JSON object.
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Evaluates one immutable policy snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RuleEvaluator<'p> {
    policy: &'p ValidatedPolicy,
}

impl<'p> RuleEvaluator<'p> {
    pub fn new(policy: &'p ValidatedPolicy) -> Self {
        Self { policy }
    }

    /// Return the first matching rule.
    pub fn evaluate(&self, context: &EvaluationContext) -> Result<RuleMatch, EvaluationError> {
        let rules = self.policy.rules();
        for compiled in rules {
            let matched = compiled.condition.evaluate(context.as_value());
            tracing::debug!(
                policy_id = %self.policy.policy_id(),
                rule = %compiled.rule.name,
                priority = compiled.rule.priority,
                matched,
                "rule evaluated"
            );
            if matched {
                let rule = &compiled.rule;
                return Ok(RuleMatch {
                    rule_name: rule.name.clone(),
                    priority: rule.priority,
                    action: rule.action,
                    assignee_role: rule.assignee_role.clone(),
                    sla_hours: rule.sla_hours,
                });
            }
        }
        tracing::error!(
            policy_id = %self.policy.policy_id(),
            rules_evaluated = rules.len(),
            "no rule matched; policy lacks a default rule"
        );
        Err(EvaluationError::NoRuleMatch {
            policy_id: self.policy.policy_id().clone(),
            rules_evaluated: rules.len(),
        })
    }

    /// Build the context and evaluate.
    pub fn evaluate_case(
        &self,
        case: &Case,
        decision: &EnsembleDecision,
        evidence: &EvidenceSnapshot,
    ) -> Result<RuleMatch, EvaluationError> {
        self.evaluate(&EvaluationContext::new(case, decision, evidence))
    }
}
