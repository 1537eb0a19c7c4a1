//! # Decision Pipeline
//!
//! Case lifecycle operations on top of the [`TransitionController`]:
//! create, submit, process, human review, and SLA expiry.
//!
//! `process` runs the automated decision path:
//!
//! 1. `submitted → processing` as `system`.
//! 2. Fan out to every agent, bounded by the agent SLA; late or failing
//!    agents become abstentions.
//! 3. Synthesize one ensemble decision under the case's policy.
//! 4. Evaluate the policy rules (first match by priority).
//! 5. Apply the matched action as a transition under the automation role,
//!    carrying the decision, evidence, rule name, and SLA deadline.
//!
//! One immutable policy snapshot is used from step 3 to step 5. Any
//! failure in steps 3 to 5 is recorded as `case.processing_failed` and the
//! case is routed to the review state instead of being left in
//! `processing`.

use std::sync::Arc;

use casegate_audit::{AuditEventType, AuditStore};
use casegate_core::{ActionType, Actor, Case, CaseId, CaseStatus, EvidenceSnapshot, Timestamp};
use casegate_ensemble::{gather_recommendations, EnsembleDecision, RecommendationAgent};
use casegate_policy::{RuleEvaluator, RuleMatch, ValidatedPolicy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::EngineConfig;
use crate::controller::{NewCase, TransitionController, TransitionRequest};
use crate::error::{PipelineError, TransitionError};

/// Where an automated decision sends a case.
///
/// | Action | Target |
/// |---|---|
/// | `approve` | `approved` |
/// | `reject` | `rejected` |
/// | `request_more_info` | `needs_more_info` |
/// | `manual_review`, `escalate` | the configured review state |
pub fn execution_target(action: ActionType, review_state: CaseStatus) -> CaseStatus {
    match action {
        ActionType::Approve => CaseStatus::Approved,
        ActionType::Reject => CaseStatus::Rejected,
        ActionType::RequestMoreInfo => CaseStatus::NeedsMoreInfo,
        ActionType::ManualReview | ActionType::Escalate => review_state,
    }
}

/// A routing instruction for the human review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAssignment {
    pub case_id: CaseId,
    /// `queue_<role>`.
    pub queue: String,
    pub assigned_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_deadline: Option<Timestamp>,
    /// Higher is served first.
    pub queue_priority: u32,
}

impl ReviewAssignment {
    fn for_case(case: &Case, role: &str) -> Self {
        Self {
            case_id: case.case_id,
            queue: format!("queue_{role}"),
            assigned_role: role.to_string(),
            sla_deadline: case.sla_deadline,
            queue_priority: case.priority.queue_weight(),
        }
    }
}

/// Result of one `process` run.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    /// The case after the run.
    pub case: Case,
    /// `None` if synthesis itself failed.
    pub decision: Option<EnsembleDecision>,
    pub rule_match: Option<RuleMatch>,
    pub assignment: Option<ReviewAssignment>,
    /// Why the automated path was abandoned, if it was.
    pub failure: Option<String>,
}

impl ProcessingOutcome {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Drives cases through the automated decision path.
pub struct DecisionPipeline {
    controller: Arc<TransitionController>,
    agents: Vec<Arc<dyn RecommendationAgent>>,
    config: EngineConfig,
}

impl std::fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let agents: Vec<&str> = self.agents.iter().map(|a| a.name()).collect();
        f.debug_struct("DecisionPipeline")
            .field("controller", &self.controller)
            .field("agents", &agents)
            .field("config", &self.config)
            .finish()
    }
}

impl DecisionPipeline {
    /// Build a pipeline over `controller`, applying the rejection-recording
    /// setting from `config` to it.
    pub fn new(
        controller: Arc<TransitionController>,
        agents: Vec<Arc<dyn RecommendationAgent>>,
        config: EngineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        controller.set_record_rejections(config.record_rejected_transitions);
        Ok(Self {
            controller,
            agents,
            config,
        })
    }

    pub fn controller(&self) -> &Arc<TransitionController> {
        &self.controller
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create_case(&self, new_case: NewCase, actor: Actor) -> Result<Case, PipelineError> {
        Ok(self.controller.create_case(new_case, actor)?)
    }

    /// `draft → submitted` or, on resubmission, `needs_more_info → submitted`.
    pub fn submit(&self, case_id: &CaseId, actor: Actor) -> Result<Case, PipelineError> {
        let request = TransitionRequest::new(*case_id, CaseStatus::Submitted, actor)
            .with_reasoning("submitted for processing");
        Ok(self.controller.transition(request)?)
    }

    /// Run the automated decision path for a submitted case.
    pub async fn process(
        &self,
        case_id: &CaseId,
        evidence: EvidenceSnapshot,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let case = self.controller.transition(
            TransitionRequest::new(*case_id, CaseStatus::Processing, Actor::system())
                .with_reasoning("intake complete; gathering agent recommendations"),
        )?;
        let policy = self.controller.registry().get(&case.policy_version)?;

        let evidence = Arc::new(evidence);
        let outcomes = gather_recommendations(
            &self.agents,
            case.case_id,
            Arc::clone(&evidence),
            self.config.agent_sla(),
        )
        .await;
        for outcome in &outcomes {
            tracing::debug!(
                case_id = %case.case_id,
                agent = outcome.agent_name(),
                abstained = outcome.is_abstention(),
                "agent outcome"
            );
        }
        let recommendations = outcomes
            .into_iter()
            .map(|outcome| outcome.into_recommendation())
            .collect();

        let decided_at = self.controller.clock().now();
        let decision =
            match policy
                .ensemble_engine()
                .synthesize(case.case_id, recommendations, decided_at)
            {
                Ok(decision) => decision,
                Err(err) => return self.fail(&case, &evidence, None, err.into()),
            };

        let evaluator = RuleEvaluator::new(&policy);
        let rule_match = match evaluator.evaluate_case(&case, &decision, &evidence) {
            Ok(rule_match) => rule_match,
            Err(err) => return self.fail(&case, &evidence, Some(decision), err.into()),
        };

        self.execute(&case, &policy, &evidence, decision, rule_match)
    }

    /// Apply a matched rule as a transition.
    fn execute(
        &self,
        case: &Case,
        policy: &ValidatedPolicy,
        evidence: &EvidenceSnapshot,
        decision: EnsembleDecision,
        rule_match: RuleMatch,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let target = execution_target(rule_match.action, self.config.review_state);
        let sla_deadline = rule_match
            .sla_hours
            .filter(|_| !target.is_terminal())
            .map(|hours| self.controller.clock().now().plus_hours(hours));

        let request = TransitionRequest::new(
            case.case_id,
            target,
            Actor::system_as(self.config.auto_actor_role.clone()),
        )
        .with_reasoning(decision.final_recommendation.reasoning.clone())
        .with_evidence(evidence.clone())
        .with_decision(decision.clone())
        .with_rule(rule_match.rule_name.clone())
        .with_sla_deadline(sla_deadline)
        .expect_version(case.version);

        let updated = match self.controller.transition(request) {
            Ok(updated) => updated,
            Err(err @ TransitionError::InvalidTransition { .. }) => {
                tracing::error!(
                    case_id = %case.case_id,
                    policy_id = %policy.policy_id(),
                    rule = %rule_match.rule_name,
                    target = %target,
                    "policy transition table does not permit the matched action"
                );
                let current = self.controller.get(&case.case_id)?;
                return self.fail(&current, evidence, Some(decision), err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let assignment = match &rule_match.assignee_role {
            Some(role) if !updated.status.is_terminal() => {
                Some(ReviewAssignment::for_case(&updated, role))
            }
            _ => None,
        };

        tracing::info!(
            case_id = %updated.case_id,
            action = %rule_match.action,
            rule = %rule_match.rule_name,
            status = %updated.status,
            confidence = decision.confidence(),
            "automated decision applied"
        );
        Ok(ProcessingOutcome {
            case: updated,
            decision: Some(decision),
            rule_match: Some(rule_match),
            assignment,
            failure: None,
        })
    }

    /// Record the failure and route the case to a human.
    fn fail(
        &self,
        case: &Case,
        evidence: &EvidenceSnapshot,
        decision: Option<EnsembleDecision>,
        error: PipelineError,
    ) -> Result<ProcessingOutcome, PipelineError> {
        let message = error.to_string();
        tracing::error!(
            case_id = %case.case_id,
            policy_id = %case.policy_version,
            error = %message,
            "automated decision failed; routing to manual review"
        );

        let recorded_decision = decision.clone();
        let recorded_evidence = evidence.clone();
        let error_text = message.clone();
        self.controller.record_event(
            &case.case_id,
            AuditEventType::ProcessingFailed,
            Actor::system(),
            move |draft| {
                let draft = draft
                    .with_reasoning(format!("automated decision failed: {error_text}"))
                    .with_evidence(recorded_evidence)
                    .with_metadata("error", json!(error_text));
                match recorded_decision {
                    Some(decision) => draft.with_decision(decision),
                    None => draft,
                }
            },
        )?;

        let case = self.controller.transition(
            TransitionRequest::new(case.case_id, self.config.review_state, Actor::system())
                .with_reasoning(format!("routed to review after processing failure: {message}")),
        )?;

        Ok(ProcessingOutcome {
            case,
            decision,
            rule_match: None,
            assignment: None,
            failure: Some(message),
        })
    }

    /// A reviewer's decision on a case under review.
    ///
    /// Only `approve`, `reject`, and `request_more_info` are review
    /// decisions. The most recent ensemble decision and evidence are
    /// attached to the event for comparison.
    pub fn review(
        &self,
        case_id: &CaseId,
        reviewer: Actor,
        action: ActionType,
        reasoning: impl Into<String>,
    ) -> Result<Case, PipelineError> {
        let target = match action {
            ActionType::Approve => CaseStatus::Approved,
            ActionType::Reject => CaseStatus::Rejected,
            ActionType::RequestMoreInfo => CaseStatus::NeedsMoreInfo,
            other => return Err(PipelineError::InvalidReviewAction(other)),
        };

        let mut request =
            TransitionRequest::new(*case_id, target, reviewer).with_reasoning(reasoning);
        let history = self.controller.audit().case_history(case_id)?;
        if let Some(last) = history.iter().rev().find(|e| e.agent_recommendation.is_some()) {
            request = request.with_evidence(last.evidence_snapshot.clone());
            if let Some(decision) = &last.agent_recommendation {
                request = request.with_decision(decision.clone());
            }
        }
        Ok(self.controller.transition(request)?)
    }

    /// Expire a case whose SLA deadline has passed.
    pub fn expire(&self, case_id: &CaseId) -> Result<Case, PipelineError> {
        let case = self.controller.get(case_id)?;
        let now = self.controller.clock().now();
        if !case.sla_breached(now) {
            return Err(PipelineError::SlaNotBreached {
                case_id: *case_id,
                deadline: case.sla_deadline,
            });
        }
        let deadline = case
            .sla_deadline
            .map(|d| d.to_iso8601())
            .unwrap_or_default();
        let request = TransitionRequest::new(*case_id, CaseStatus::Expired, Actor::system())
            .with_reasoning(format!("SLA deadline {deadline} passed"))
            .expect_version(case.version);
        Ok(self.controller.transition(request)?)
    }

    /// Expire every open case past its SLA. Cases that cannot be expired
    /// right now (held by another operation, or not permitted by their
    /// policy) are skipped and logged.
    pub fn expire_overdue(&self) -> Vec<Case> {
        let now = self.controller.clock().now();
        let mut expired = Vec::new();
        for case_id in self.controller.cases().case_ids() {
            let Some(case) = self.controller.cases().get(&case_id) else {
                continue;
            };
            if case.is_closed() || !case.sla_breached(now) {
                continue;
            }
            match self.expire(&case_id) {
                Ok(case) => expired.push(case),
                Err(err) => {
                    tracing::warn!(
                        case_id = %case_id,
                        error = %err,
                        "could not expire overdue case"
                    );
                }
            }
        }
        expired
    }
}
