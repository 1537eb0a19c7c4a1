//! # Transition Controller
//!
//! The sole authority for case state changes.
//!
//! A transition request is checked against the transition table of the
//! policy version the case is bound to. A legal request becomes one
//! `state.transition` audit event carrying the from/to states, actor,
//! reasoning, evidence snapshot, triggering ensemble decision, and matched
//! rule name. The event is appended at `case.version + 1`; only once the
//! append succeeds is the cached case advanced, by folding that event.
//!
//! An illegal request never changes the case. When configured, it is
//! recorded as a `transition.rejected` event.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use casegate_audit::{
    apply_event, created_case, AuditError, AuditEvent, AuditEventDraft, AuditEventType, AuditStore,
};
use casegate_audit::projection::keys;
use casegate_core::{
    Actor, Case, CaseId, CasePriority, CaseStatus, Clock, EvidenceSnapshot, Timestamp,
};
use casegate_ensemble::EnsembleDecision;
use casegate_policy::PolicyRegistry;
use serde_json::{json, Value};

use crate::error::TransitionError;
use crate::store::CaseStore;

// ── Requests ─────────────────────────────────────────────────────────

/// A request to move a case to `to_state`.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub case_id: CaseId,
    pub to_state: CaseStatus,
    pub actor: Actor,
    pub reasoning: Option<String>,
    pub evidence: EvidenceSnapshot,
    pub decision: Option<EnsembleDecision>,
    pub rule_matched: Option<String>,
    /// Deadline for the step being entered. Ignored for terminal targets.
    pub sla_deadline: Option<Timestamp>,
    /// The case version the caller based this request on. A mismatch is a
    /// conflict.
    pub expected_version: Option<u64>,
}

impl TransitionRequest {
    pub fn new(case_id: CaseId, to_state: CaseStatus, actor: Actor) -> Self {
        Self {
            case_id,
            to_state,
            actor,
            reasoning: None,
            evidence: EvidenceSnapshot::new(),
            decision: None,
            rule_matched: None,
            sla_deadline: None,
            expected_version: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_evidence(mut self, evidence: EvidenceSnapshot) -> Self {
        self.evidence = evidence;
        self
    }

    /// Attach the decision that triggered the request.
    pub fn with_decision(mut self, decision: EnsembleDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_matched = Some(rule_name.into());
        self
    }

    pub fn with_sla_deadline(mut self, deadline: Option<Timestamp>) -> Self {
        self.sla_deadline = deadline;
        self
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Parameters for opening a case.
#[derive(Debug, Clone, Default)]
pub struct NewCase {
    pub vertical: String,
    pub priority: CasePriority,
    pub metadata: BTreeMap<String, Value>,
}

impl NewCase {
    pub fn new(vertical: impl Into<String>) -> Self {
        Self {
            vertical: vertical.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: CasePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// ── Controller ───────────────────────────────────────────────────────

pub struct TransitionController {
    cases: CaseStore,
    audit: Arc<dyn AuditStore>,
    registry: Arc<PolicyRegistry>,
    clock: Arc<dyn Clock>,
    record_rejections: AtomicBool,
}

impl std::fmt::Debug for TransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionController")
            .field("cases", &self.cases.len())
            .field("record_rejections", &self.records_rejections())
            .finish_non_exhaustive()
    }
}

impl TransitionController {
    pub fn new(
        audit: Arc<dyn AuditStore>,
        registry: Arc<PolicyRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cases: CaseStore::new(),
            audit,
            registry,
            clock,
            record_rejections: AtomicBool::new(true),
        }
    }

    /// Whether refused requests are written as `transition.rejected`.
    pub fn record_rejections(self, enabled: bool) -> Self {
        self.set_record_rejections(enabled);
        self
    }

    /// Change whether refused requests are recorded, for a controller
    /// that is already shared.
    pub fn set_record_rejections(&self, enabled: bool) {
        self.record_rejections.store(enabled, Ordering::Relaxed);
    }

    pub fn records_rejections(&self) -> bool {
        self.record_rejections.load(Ordering::Relaxed)
    }

    pub fn cases(&self) -> &CaseStore {
        &self.cases
    }

    pub fn audit(&self) -> &Arc<dyn AuditStore> {
        &self.audit
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// A snapshot of the cached case.
    pub fn get(&self, case_id: &CaseId) -> Result<Case, TransitionError> {
        self.cases
            .get(case_id)
            .ok_or(TransitionError::CaseNotFound(*case_id))
    }

    /// Open a case in `draft` under the active policy of its vertical.
    pub fn create_case(&self, new_case: NewCase, actor: Actor) -> Result<Case, TransitionError> {
        let policy = self.registry.active_for(&new_case.vertical)?;
        let case_id = CaseId::new();
        let draft = AuditEventDraft::new(
            case_id,
            AuditEventType::CaseCreated,
            actor,
            policy.policy_id().clone(),
            self.clock.now(),
        )
        .with_metadata(keys::VERTICAL, json!(new_case.vertical))
        .with_metadata(keys::PRIORITY, json!(new_case.priority.as_str()))
        .with_metadata(keys::CASE_METADATA, json!(new_case.metadata));

        let event = self.append(draft, 1)?;
        let case = created_case(&event)?;
        self.cases.insert(case.clone())?;

        tracing::info!(
            case_id = %case_id,
            vertical = %case.vertical,
            policy_id = %case.policy_version,
            "case created"
        );
        Ok(case)
    }

    /// Apply a transition request.
    pub fn transition(&self, request: TransitionRequest) -> Result<Case, TransitionError> {
        let case_id = request.case_id;
        self.cases.try_update(&case_id, |case| {
            if let Some(expected) = request.expected_version {
                if expected != case.version {
                    return Err(TransitionError::ConcurrentTransitionConflict {
                        case_id,
                        detail: format!(
                            "request based on version {expected}, case is at version {}",
                            case.version
                        ),
                    });
                }
            }

            let policy = self.registry.get(&case.policy_version)?;
            let from = case.status;
            let to = request.to_state;
            let role = request.actor.role.clone();

            if let Err(denial) = policy.state_machine().check_transition(&from, &to, &role) {
                tracing::warn!(
                    case_id = %case_id,
                    from = %from,
                    to = %to,
                    role = %role,
                    reason = %denial,
                    "transition rejected"
                );
                if self.records_rejections() {
                    self.record_rejection(case, &request, &denial.to_string());
                }
                return Err(TransitionError::InvalidTransition {
                    case_id,
                    from,
                    to,
                    role,
                    reason: denial.to_string(),
                });
            }

            let mut draft = AuditEventDraft::new(
                case_id,
                AuditEventType::StateTransition,
                request.actor.clone(),
                case.policy_version.clone(),
                self.next_timestamp(case),
            )
            .with_transition(from, to)
            .with_evidence(request.evidence.clone());
            if let Some(reasoning) = &request.reasoning {
                draft = draft.with_reasoning(reasoning.clone());
            }
            if let Some(decision) = &request.decision {
                draft = draft.with_decision(decision.clone());
            }
            if let Some(rule) = &request.rule_matched {
                draft = draft.with_rule(rule.clone());
            }
            if let Some(deadline) = request.sla_deadline.filter(|_| !to.is_terminal()) {
                draft = draft.with_metadata(keys::SLA_DEADLINE, json!(deadline.to_iso8601()));
            }

            let event = self.append(draft, case.version + 1)?;
            self.advance(case, &event)?;

            tracing::info!(
                case_id = %case_id,
                from = %from,
                to = %to,
                role = %role,
                sequence = event.sequence,
                rule = request.rule_matched.as_deref().unwrap_or("-"),
                "transition committed"
            );
            Ok(case.clone())
        })
    }

    /// Record a non-transition event (e.g. `case.processing_failed`).
    pub fn record_event(
        &self,
        case_id: &CaseId,
        event_type: AuditEventType,
        actor: Actor,
        build: impl FnOnce(AuditEventDraft) -> AuditEventDraft,
    ) -> Result<AuditEvent, TransitionError> {
        self.cases.try_update(case_id, |case| {
            let draft = build(AuditEventDraft::new(
                *case_id,
                event_type,
                actor,
                case.policy_version.clone(),
                self.next_timestamp(case),
            ));
            if draft.transition.is_some() || event_type == AuditEventType::StateTransition {
                return Err(TransitionError::Audit(AuditError::CorruptHistory {
                    case_id: *case_id,
                    sequence: case.version + 1,
                    reason: "state changes must go through transition()".into(),
                }));
            }
            let event = self.append(draft, case.version + 1)?;
            self.advance(case, &event)?;
            Ok(event)
        })
    }

    /// Rebuild the cached case from its audit history.
    pub fn refresh(&self, case_id: &CaseId) -> Result<Case, TransitionError> {
        let case = match self.audit.reconstruct_state(case_id, None) {
            Ok(case) => case,
            Err(AuditError::CaseNotFound(id)) => return Err(TransitionError::CaseNotFound(id)),
            Err(e) => return Err(e.into()),
        };
        self.cases.restore(case.clone());
        Ok(case)
    }

    fn record_rejection(&self, case: &mut Case, request: &TransitionRequest, reason: &str) {
        let mut draft = AuditEventDraft::new(
            case.case_id,
            AuditEventType::TransitionRejected,
            request.actor.clone(),
            case.policy_version.clone(),
            self.next_timestamp(case),
        )
        .with_metadata("from_state", json!(case.status.dotted()))
        .with_metadata("requested_state", json!(request.to_state.dotted()))
        .with_metadata("denial", json!(reason));
        if let Some(reasoning) = &request.reasoning {
            draft = draft.with_reasoning(reasoning.clone());
        }
        match self.append(draft, case.version + 1) {
            Ok(event) => {
                if let Err(e) = self.advance(case, &event) {
                    tracing::error!(
                        case_id = %case.case_id,
                        error = %e,
                        "failed to fold rejection event"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    case_id = %case.case_id,
                    error = %e,
                    "failed to record rejected transition"
                );
            }
        }
    }

    fn append(&self, draft: AuditEventDraft, expected: u64) -> Result<AuditEvent, TransitionError> {
        let case_id = draft.case_id;
        self.audit.append(draft, expected).map_err(|e| {
            tracing::error!(
                case_id = %case_id,
                expected_sequence = expected,
                error = %e,
                "audit append failed; case unchanged"
            );
            match e {
                AuditError::SequenceConflict { .. } => {
                    TransitionError::ConcurrentTransitionConflict {
                        case_id,
                        detail: e.to_string(),
                    }
                }
                other => TransitionError::Audit(other),
            }
        })
    }

    /// Fold a committed event into the cache.
    fn advance(&self, case: &mut Case, event: &AuditEvent) -> Result<(), TransitionError> {
        let mut next = case.clone();
        apply_event(&mut next, event)?;
        *case = next;
        Ok(())
    }

    /// Event time: the clock, but never before the case's last change.
    fn next_timestamp(&self, case: &Case) -> Timestamp {
        self.clock.now().max(case.updated_at)
    }
}
