//! # Policy Simulation
//!
//! ```text
//! audit history ──▶ last automated decision event
//!                     ├── evidence_snapshot
//!                     ├── agent_recommendation (ensemble decision, cached)
//!                     └── fold of the events before it ──▶ case
//!                                                           │
//!                       alternate policy ──▶ RuleEvaluator ─┴─▶ simulated RuleMatch
//! ```
//!
//! The original match is the rule named on the decision event, looked up
//! in the policy version the case ran under.

use std::sync::Arc;

use casegate_audit::{reconstruct_state, AuditEvent, AuditStore};
use casegate_core::{ActionType, Case, CaseId, CaseStatus, PolicyId, Timestamp};
use casegate_ensemble::EnsembleDecision;
use casegate_policy::{PolicyDiff, PolicyRegistry, RuleEvaluator, RuleMatch, ValidatedPolicy};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// Original and simulated outcomes for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub case_id: CaseId,
    pub original_policy: PolicyId,
    pub simulated_policy: PolicyId,
    /// Sequence number of the replayed decision event.
    pub decision_sequence: u64,
    /// When the original decision was made.
    pub decided_at: Timestamp,
    pub original: RuleMatch,
    /// The state the original decision moved the case to.
    pub original_state: Option<CaseStatus>,
    pub simulated: RuleMatch,
    /// The recorded ensemble action both evaluations saw.
    pub ensemble_action: ActionType,
    pub decision_changed: bool,
    pub rule_changed: bool,
    pub policy_diff: PolicyDiff,
}

/// Impact of an alternate policy across many cases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    pub simulated_policy: Option<PolicyId>,
    pub results: Vec<SimulationResult>,
    /// Cases that could not be simulated, with the reason.
    pub skipped: Vec<(CaseId, String)>,
}

impl SimulationReport {
    pub fn changed(&self) -> impl Iterator<Item = &SimulationResult> {
        self.results.iter().filter(|r| r.decision_changed)
    }

    pub fn changed_count(&self) -> usize {
        self.changed().count()
    }
}

/// Read-only replay over committed audit history.
pub struct SimulationEngine {
    audit: Arc<dyn AuditStore>,
    registry: Arc<PolicyRegistry>,
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SimulationEngine {
    pub fn new(audit: Arc<dyn AuditStore>, registry: Arc<PolicyRegistry>) -> Self {
        Self { audit, registry }
    }

    /// Re-decide a case under `alternate`.
    pub fn simulate(
        &self,
        case_id: &CaseId,
        alternate: &PolicyId,
    ) -> Result<SimulationResult, ReplayError> {
        let alternate = self.registry.get(alternate)?;
        self.simulate_with(case_id, &alternate)
    }

    /// Re-decide a case under an already loaded policy.
    pub fn simulate_with(
        &self,
        case_id: &CaseId,
        alternate: &ValidatedPolicy,
    ) -> Result<SimulationResult, ReplayError> {
        let history = self.audit.case_history(case_id)?;
        if history.is_empty() {
            return Err(ReplayError::CaseNotFound(*case_id));
        }
        let (index, event, decision) = last_decision(&history)
            .ok_or(ReplayError::NoDecision(*case_id))?;

        let case = reconstruct_state(&history[..index], None)?
            .ok_or(ReplayError::CaseNotFound(*case_id))?;
        let original_policy = self.registry.get(&event.policy_version)?;
        let original = recorded_match(&original_policy, event)?;

        let simulated = RuleEvaluator::new(alternate).evaluate_case(
            &case,
            decision,
            &event.evidence_snapshot,
        )?;

        let result = SimulationResult {
            case_id: *case_id,
            original_policy: original_policy.policy_id().clone(),
            simulated_policy: alternate.policy_id().clone(),
            decision_sequence: event.sequence,
            decided_at: event.timestamp,
            decision_changed: original.action != simulated.action,
            rule_changed: original.rule_name != simulated.rule_name,
            original_state: event.transition.map(|t| t.to_state),
            ensemble_action: decision.action(),
            policy_diff: PolicyDiff::between(original_policy.policy(), alternate.policy()),
            original,
            simulated,
        };

        tracing::info!(
            case_id = %case_id,
            original_policy = %result.original_policy,
            simulated_policy = %result.simulated_policy,
            original_rule = %result.original.rule_name,
            simulated_rule = %result.simulated.rule_name,
            decision_changed = result.decision_changed,
            "simulation complete"
        );
        Ok(result)
    }

    /// Simulate every case with a recorded decision.
    pub fn simulate_all(&self, alternate: &PolicyId) -> Result<SimulationReport, ReplayError> {
        let policy = self.registry.get(alternate)?;
        let mut report = SimulationReport {
            simulated_policy: Some(policy.policy_id().clone()),
            ..SimulationReport::default()
        };
        let mut case_ids = self.audit.case_ids();
        case_ids.sort();
        for case_id in case_ids {
            match self.simulate_with(&case_id, &policy) {
                Ok(result) => report.results.push(result),
                Err(err) => {
                    tracing::debug!(case_id = %case_id, error = %err, "case skipped");
                    report.skipped.push((case_id, err.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// The case as recorded at `as_of` (or now).
    pub fn state_at(
        &self,
        case_id: &CaseId,
        as_of: Option<Timestamp>,
    ) -> Result<Case, ReplayError> {
        match self.audit.reconstruct_state(case_id, as_of) {
            Ok(case) => Ok(case),
            Err(casegate_audit::AuditError::CaseNotFound(id)) => Err(ReplayError::CaseNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// The most recent event carrying both an ensemble decision and a matched
/// rule, with its index in `history`.
fn last_decision(history: &[AuditEvent]) -> Option<(usize, &AuditEvent, &EnsembleDecision)> {
    history
        .iter()
        .enumerate()
        .rev()
        .find_map(|(index, event)| match (&event.agent_recommendation, event.is_decision()) {
            (Some(decision), true) => Some((index, event, decision)),
            _ => None,
        })
}

fn recorded_match(policy: &ValidatedPolicy, event: &AuditEvent) -> Result<RuleMatch, ReplayError> {
    let rule_name = event.policy_rule_matched.as_deref().unwrap_or_default();
    policy
        .rules()
        .iter()
        .map(|compiled| &compiled.rule)
        .find(|rule| rule.name == rule_name)
        .map(|rule| RuleMatch {
            rule_name: rule.name.clone(),
            priority: rule.priority,
            action: rule.action,
            assignee_role: rule.assignee_role.clone(),
            sla_hours: rule.sla_hours,
        })
        .ok_or_else(|| {
            ReplayError::Audit(casegate_audit::AuditError::CorruptHistory {
                case_id: event.case_id,
                sequence: event.sequence,
                reason: format!(
                    "rule '{rule_name}' is not part of policy '{}'",
                    policy.policy_id()
                ),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_audit::{AuditEventDraft, AuditEventType, InMemoryAuditStore};
    use casegate_audit::projection::keys;
    use casegate_core::{Actor, EvidenceSnapshot, ReviewStage};
    use casegate_ensemble::AgentRecommendation;
    use casegate_policy::Policy;
    use serde_json::json;

    const V1: &str = include_str!("../../../policies/kyc_v1.yaml");
    const V2: &str = include_str!("../../../policies/kyc_v2.yaml");

    struct Fixture {
        audit: Arc<InMemoryAuditStore>,
        registry: Arc<PolicyRegistry>,
        engine: SimulationEngine,
    }

    fn fixture() -> Fixture {
        let audit = Arc::new(InMemoryAuditStore::new());
        let registry = Arc::new(PolicyRegistry::new());
        registry.register(Policy::from_yaml_str(V1).unwrap()).unwrap();
        registry.register(Policy::from_yaml_str(V2).unwrap()).unwrap();
        let engine = SimulationEngine::new(audit.clone(), registry.clone());
        Fixture {
            audit,
            registry,
            engine,
        }
    }

    fn t(ms: i64) -> Timestamp {
        Timestamp::parse("2026-01-15T12:00:00Z").unwrap().plus_millis(ms)
    }

    /// Write a case history ending in an automated decision under v1.
    fn decided_case(f: &Fixture, confidence: f64, risk: f64, flag: Option<&str>) -> CaseId {
        let v1 = f.registry.get(&PolicyId::new("pol_kyc_v1")).unwrap();
        let id = CaseId::new();
        let policy_id = v1.policy_id().clone();
        let mut seq = 0;
        let mut append = |draft: AuditEventDraft| {
            seq += 1;
            f.audit.append(draft, seq).unwrap()
        };
        let new = |ty, ms| AuditEventDraft::new(id, ty, Actor::system(), policy_id.clone(), t(ms));

        append(new(AuditEventType::CaseCreated, 0).with_metadata(keys::VERTICAL, json!("kyc")));
        append(
            new(AuditEventType::StateTransition, 1)
                .with_transition(CaseStatus::Draft, CaseStatus::Submitted),
        );
        append(
            new(AuditEventType::StateTransition, 2)
                .with_transition(CaseStatus::Submitted, CaseStatus::Processing),
        );

        let recs = ["compliance_agent", "fraud_agent", "identity_agent", "risk_agent"]
            .into_iter()
            .map(|name| {
                let rec = AgentRecommendation::new(
                    name,
                    "1.0",
                    ActionType::Approve,
                    confidence,
                    risk,
                    "Looks fine.",
                );
                match flag {
                    Some(flag) if name == "risk_agent" => rec.with_flag(flag),
                    _ => rec,
                }
            })
            .collect();
        let decision = v1.ensemble_engine().synthesize(id, recs, t(3)).unwrap();
        let evidence = EvidenceSnapshot::new()
            .with("compliance", json!({"sanctions_screening": {"status": "clear"}}));
        let case = reconstruct_state(&f.audit.case_history(&id).unwrap(), None).unwrap().unwrap();
        let matched = RuleEvaluator::new(&v1).evaluate_case(&case, &decision, &evidence).unwrap();
        let target = match matched.action {
            ActionType::Approve => CaseStatus::Approved,
            _ => CaseStatus::UnderReview(Some(ReviewStage::ManualReview)),
        };
        append(
            new(AuditEventType::StateTransition, 4)
                .with_transition(CaseStatus::Processing, target)
                .with_evidence(evidence)
                .with_decision(decision)
                .with_rule(matched.rule_name),
        );
        id
    }

    #[test]
    fn test_tighter_policy_changes_borderline_approval() {
        let f = fixture();
        let id = decided_case(&f, 0.96, 10.0, None);
        let result = f.engine.simulate(&id, &PolicyId::new("pol_kyc_v2")).unwrap();

        assert_eq!(result.original.rule_name, "high_confidence_auto_approve");
        assert_eq!(result.original.action, ActionType::Approve);
        assert_eq!(result.original_state, Some(CaseStatus::Approved));
        assert_eq!(result.simulated.rule_name, "default_manual_review");
        assert!(result.decision_changed);
        assert!(result.rule_changed);
        assert_eq!(result.policy_diff.rules_added, vec!["address_unverified".to_string()]);
        assert_eq!(result.decision_sequence, 4);
    }

    #[test]
    fn test_same_policy_reproduces_original() {
        let f = fixture();
        let id = decided_case(&f, 0.6, 10.0, None);
        let result = f.engine.simulate(&id, &PolicyId::new("pol_kyc_v1")).unwrap();
        assert_eq!(result.original, result.simulated);
        assert!(!result.decision_changed);
        assert!(result.policy_diff.is_empty());
    }

    #[test]
    fn test_flagged_case_hits_new_rule() {
        let f = fixture();
        let id = decided_case(&f, 0.99, 10.0, Some("address_unverified"));
        let result = f.engine.simulate(&id, &PolicyId::new("pol_kyc_v2")).unwrap();
        assert_eq!(result.simulated.rule_name, "address_unverified");
        assert_eq!(result.simulated.sla_hours, Some(12));
    }

    #[test]
    fn test_simulation_writes_nothing() {
        let f = fixture();
        let id = decided_case(&f, 0.96, 10.0, None);
        let before = f.audit.export();
        let state_before = f.audit.reconstruct_state(&id, None).unwrap();
        f.engine.simulate(&id, &PolicyId::new("pol_kyc_v2")).unwrap();
        f.engine.simulate_all(&PolicyId::new("pol_kyc_v2")).unwrap();
        assert_eq!(f.audit.export(), before);
        assert_eq!(f.audit.reconstruct_state(&id, None).unwrap(), state_before);
    }

    #[test]
    fn test_undecided_case_has_nothing_to_replay() {
        let f = fixture();
        let id = CaseId::new();
        f.audit
            .append(
                AuditEventDraft::new(
                    id,
                    AuditEventType::CaseCreated,
                    Actor::system(),
                    PolicyId::new("pol_kyc_v1"),
                    t(0),
                )
                .with_metadata(keys::VERTICAL, json!("kyc")),
                1,
            )
            .unwrap();
        assert!(matches!(
            f.engine.simulate(&id, &PolicyId::new("pol_kyc_v2")),
            Err(ReplayError::NoDecision(_))
        ));
        assert!(matches!(
            f.engine.simulate(&CaseId::new(), &PolicyId::new("pol_kyc_v2")),
            Err(ReplayError::CaseNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_alternate_policy() {
        let f = fixture();
        let id = decided_case(&f, 0.96, 10.0, None);
        assert!(matches!(
            f.engine.simulate(&id, &PolicyId::new("pol_kyc_v9")),
            Err(ReplayError::Policy(_))
        ));
    }

    #[test]
    fn test_simulate_all_reports_changes_and_skips() {
        let f = fixture();
        decided_case(&f, 0.96, 10.0, None);
        decided_case(&f, 0.6, 10.0, None);
        let undecided = CaseId::new();
        f.audit
            .append(
                AuditEventDraft::new(
                    undecided,
                    AuditEventType::CaseCreated,
                    Actor::system(),
                    PolicyId::new("pol_kyc_v1"),
                    t(0),
                )
                .with_metadata(keys::VERTICAL, json!("kyc")),
                1,
            )
            .unwrap();

        let report = f.engine.simulate_all(&PolicyId::new("pol_kyc_v2")).unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.changed_count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, undecided);
    }

    #[test]
    fn test_state_at_before_decision() {
        let f = fixture();
        let id = decided_case(&f, 0.96, 10.0, None);
        assert_eq!(f.engine.state_at(&id, Some(t(2))).unwrap().status, CaseStatus::Processing);
        assert_eq!(f.engine.state_at(&id, None).unwrap().status, CaseStatus::Approved);
    }
}
