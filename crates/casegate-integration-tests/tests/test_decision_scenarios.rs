//! # Decision Scenarios
//!
//! End-to-end runs of the automated decision path: agents, ensemble
//! synthesis, rule evaluation, and the resulting transition, checked
//! against the audit log.

mod common;

use casegate_audit::{AuditEventType, AuditStore};
use casegate_core::{ActionType, CasePriority, CaseStatus, Clock, EvidenceSnapshot, ReviewStage};
use casegate_ensemble::RiskBand;
use casegate_policy::{Policy, RuleEvaluator, ValidatedPolicy};
use casegate_state::NewCase;

use common::{rec, Harness};

const MANUAL_REVIEW: CaseStatus = CaseStatus::UnderReview(Some(ReviewStage::ManualReview));

// ---------------------------------------------------------------------------
// 1. Mid-band flag override
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mid_band_flag_forces_manual_review() {
    let h = Harness::new(common::mid_band_recs());
    let case = h.submitted_case(NewCase::new("kyc"));

    let outcome = h
        .pipeline
        .process(&case.case_id, EvidenceSnapshot::new())
        .await
        .unwrap();
    assert!(!outcome.is_failure());

    let decision = outcome.decision.as_ref().unwrap();
    let fin = &decision.final_recommendation;
    assert_eq!(fin.action, ActionType::ManualReview);
    assert!((fin.risk_score - 45.0).abs() < 1e-9);
    assert!((fin.confidence - 0.88).abs() < 0.01);
    assert!(fin.voting_details.flag_override_applied);
    assert_eq!(fin.voting_details.risk_band, Some(RiskBand::Mid));

    let rule = outcome.rule_match.as_ref().unwrap();
    assert_eq!(rule.rule_name, "default_manual_review");
    assert_eq!(outcome.case.status, MANUAL_REVIEW);
    assert_eq!(outcome.case.sla_deadline, Some(h.clock.now().plus_hours(24)));

    let assignment = outcome.assignment.unwrap();
    assert_eq!(assignment.queue, "queue_kyc_analyst");
    assert_eq!(assignment.queue_priority, 50);
}

// ---------------------------------------------------------------------------
// 2. Low-band unanimous approval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn low_risk_unanimous_vote_approves_without_override() {
    let recs = common::mid_band_recs()
        .into_iter()
        .map(|mut r| {
            r.action = ActionType::Approve;
            r.risk_score = 15.0;
            r.risk_flags.clear();
            r
        })
        .collect();
    let h = Harness::new(recs);
    let case = h.submitted_case(NewCase::new("kyc"));

    let outcome = h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap();
    let decision = outcome.decision.unwrap();
    assert_eq!(decision.action(), ActionType::Approve);
    assert!(!decision.final_recommendation.voting_details.flag_override_applied);
    assert_eq!(decision.final_recommendation.voting_details.risk_band, Some(RiskBand::Low));

    // Weighted confidence is below the v1 auto-approve bar, so a human looks.
    assert!(decision.confidence() < 0.95);
    assert_eq!(outcome.rule_match.unwrap().rule_name, "default_manual_review");
}

#[tokio::test]
async fn confident_clean_case_is_auto_approved() {
    let recs = ["compliance_agent", "fraud_agent", "identity_agent", "risk_agent"]
        .into_iter()
        .map(|name| rec(name, ActionType::Approve, 0.99, 8.0))
        .collect();
    let h = Harness::new(recs);
    let case = h.submitted_case(NewCase::new("kyc"));

    let outcome = h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap();
    assert_eq!(outcome.case.status, CaseStatus::Approved);
    assert_eq!(outcome.case.sla_deadline, None);
    assert!(outcome.assignment.is_none());

    let history = h.audit.case_history(&case.case_id).unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.actor.role, "workflow_engine");
    assert_eq!(last.policy_rule_matched.as_deref(), Some("high_confidence_auto_approve"));
    assert!(last.agent_recommendation.is_some());
}

// ---------------------------------------------------------------------------
// 3. Sanctions hit escalates regardless of confidence
// ---------------------------------------------------------------------------

#[test]
fn sanctions_rule_wins_over_default() {
    let yaml = r#"
policy_id: pol_sanctions_only
vertical: kyc
version: "1"
voting_strategy:
  strategy: weighted
rules:
  - priority: 1
    name: sanctions_hit
    condition: "compliance.sanctions_screening.status == 'hit'"
    action: escalate
  - priority: 99
    name: fallback
    condition: "*"
    action: manual_review
state_machine:
  states: [draft, submitted, processing, under_review.manual_review, approved, rejected]
  transitions:
    - { from: draft, to: submitted, allowed_roles: [customer] }
  terminal_states: [approved, rejected]
"#;
    let policy = ValidatedPolicy::new(Policy::from_yaml_str(yaml).unwrap()).unwrap();
    let engine = policy.ensemble_engine();

    for confidence in [0.1, 0.5, 0.99] {
        let case = casegate_core::Case {
            case_id: casegate_core::CaseId::new(),
            vertical: "kyc".into(),
            status: CaseStatus::Processing,
            priority: CasePriority::Normal,
            policy_version: policy.policy_id().clone(),
            sla_deadline: None,
            metadata: Default::default(),
            created_at: common::t0(),
            updated_at: common::t0(),
            version: 3,
        };
        let decision = engine
            .synthesize(
                case.case_id,
                vec![rec("identity_agent", ActionType::Approve, confidence, 5.0)],
                common::t0(),
            )
            .unwrap();
        let matched = RuleEvaluator::new(&policy)
            .evaluate_case(&case, &decision, &common::sanctions_hit())
            .unwrap();
        assert_eq!(matched.priority, 1);
        assert_eq!(matched.action, ActionType::Escalate);
    }
}

#[tokio::test]
async fn sanctions_hit_routes_urgent_case_to_senior_officer() {
    let recs = vec![
        rec("compliance_agent", ActionType::Approve, 0.99, 5.0),
        rec("identity_agent", ActionType::Approve, 0.99, 5.0),
    ];
    let h = Harness::new(recs);
    let case = h.submitted_case(NewCase::new("kyc").with_priority(CasePriority::Urgent));

    let outcome = h.pipeline.process(&case.case_id, common::sanctions_hit()).await.unwrap();
    let rule = outcome.rule_match.unwrap();
    assert_eq!(rule.rule_name, "sanctions_hit");
    assert_eq!(outcome.case.status, MANUAL_REVIEW);

    let assignment = outcome.assignment.unwrap();
    assert_eq!(assignment.assigned_role, "senior_compliance_officer");
    assert_eq!(assignment.queue_priority, 100);
    assert_eq!(assignment.sla_deadline, Some(h.clock.now().plus_hours(2)));

    let history = h.audit.case_history(&case.case_id).unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.evidence_snapshot, common::sanctions_hit());
}

// ---------------------------------------------------------------------------
// 4. Terminal states are final
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approved_case_rejects_every_further_transition() {
    let recs = vec![rec("identity_agent", ActionType::Approve, 0.99, 5.0)];
    let h = Harness::new(recs);
    let case = h.submitted_case(NewCase::new("kyc"));
    let approved = h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap().case;
    assert_eq!(approved.status, CaseStatus::Approved);

    for target in CaseStatus::ALL {
        let result = h.controller().transition(casegate_state::TransitionRequest::new(
            case.case_id,
            target,
            casegate_core::Actor::system(),
        ));
        assert!(
            matches!(result, Err(casegate_state::TransitionError::InvalidTransition { .. })),
            "approved -> {target} must be refused"
        );
    }
    assert_eq!(h.controller().get(&case.case_id).unwrap().status, CaseStatus::Approved);
    assert_eq!(
        h.audit.reconstruct_state(&case.case_id, None).unwrap().status,
        CaseStatus::Approved
    );
}

// ---------------------------------------------------------------------------
// 5. Failure routing and review loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn processing_failure_is_audited_and_routed_to_review() {
    let h = Harness::new(Vec::new());
    let case = h.submitted_case(NewCase::new("kyc"));

    let outcome = h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap();
    assert!(outcome.is_failure());
    assert_eq!(outcome.case.status, MANUAL_REVIEW);

    let history = h.audit.case_history(&case.case_id).unwrap();
    let failure = history
        .iter()
        .find(|e| e.event_type == AuditEventType::ProcessingFailed)
        .expect("processing failure must be audited");
    assert!(failure.metadata.contains_key("error"));
}

#[tokio::test]
async fn reviewer_closes_case_after_more_info_loop() {
    let h = Harness::new(common::mid_band_recs());
    let case = h.submitted_case(NewCase::new("kyc"));
    h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap();

    let waiting = h
        .pipeline
        .review(
            &case.case_id,
            common::reviewer(),
            ActionType::RequestMoreInfo,
            "need proof of address",
        )
        .unwrap();
    assert_eq!(waiting.status, CaseStatus::NeedsMoreInfo);

    h.pipeline.submit(&case.case_id, common::customer()).unwrap();
    h.pipeline.process(&case.case_id, EvidenceSnapshot::new()).await.unwrap();
    let closed = h
        .pipeline
        .review(&case.case_id, common::reviewer(), ActionType::Approve, "address verified by phone")
        .unwrap();
    assert_eq!(closed.status, CaseStatus::Approved);

    h.audit.verify_chain(&case.case_id).unwrap();
    assert_eq!(h.audit.reconstruct_state(&case.case_id, None).unwrap(), closed);
}
