//! # Audit Events
//!
//! Immutable records of everything that happened to a case. Callers build
//! an [`AuditEventDraft`]; the store assigns the sequence number, the chain
//! link, and the digest when it commits the draft as an [`AuditEvent`].

use std::collections::BTreeMap;

use casegate_core::{
    Actor, CaseId, CaseStatus, ContentDigest, EventId, EvidenceSnapshot, PolicyId, Timestamp,
};
use casegate_ensemble::EnsembleDecision;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What an event records. Webhook and notification layers key off these
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    /// A case was opened. Carries `vertical`, `priority`, and
    /// `case_metadata` in the event metadata.
    #[serde(rename = "case.created")]
    CaseCreated,
    /// A committed state transition.
    #[serde(rename = "state.transition")]
    StateTransition,
    /// A refused transition request. Never changes state.
    #[serde(rename = "transition.rejected")]
    TransitionRejected,
    /// The automated decision path failed and the case was routed to a
    /// human.
    #[serde(rename = "case.processing_failed")]
    ProcessingFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreated => "case.created",
            Self::StateTransition => "state.transition",
            Self::TransitionRejected => "transition.rejected",
            Self::ProcessingFailed => "case.processing_failed",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `{from_state, to_state}` pair of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: CaseStatus,
    pub to_state: CaseStatus,
}

/// An event before it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEventDraft {
    pub case_id: CaseId,
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    pub actor: Actor,
    pub transition: Option<StateTransition>,
    pub reasoning: Option<String>,
    pub evidence_snapshot: EvidenceSnapshot,
    /// The ensemble decision that triggered this event.
    pub agent_recommendation: Option<EnsembleDecision>,
    pub policy_version: PolicyId,
    pub policy_rule_matched: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl AuditEventDraft {
    /// A draft with no transition, reasoning, evidence, or decision.
    pub fn new(
        case_id: CaseId,
        event_type: AuditEventType,
        actor: Actor,
        policy_version: PolicyId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            case_id,
            timestamp,
            event_type,
            actor,
            transition: None,
            reasoning: None,
            evidence_snapshot: EvidenceSnapshot::new(),
            agent_recommendation: None,
            policy_version,
            policy_rule_matched: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_transition(mut self, from_state: CaseStatus, to_state: CaseStatus) -> Self {
        self.transition = Some(StateTransition {
            from_state,
            to_state,
        });
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_evidence(mut self, evidence: EvidenceSnapshot) -> Self {
        self.evidence_snapshot = evidence;
        self
    }

    pub fn with_decision(mut self, decision: EnsembleDecision) -> Self {
        self.agent_recommendation = Some(decision);
        self
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.policy_rule_matched = Some(rule_name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A committed, immutable audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: EventId,
    pub case_id: CaseId,
    /// 1-based position in the case's log.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<StateTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub evidence_snapshot: EvidenceSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_recommendation: Option<EnsembleDecision>,
    pub policy_version: PolicyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_rule_matched: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Digest of the previous event; `None` for the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_digest: Option<ContentDigest>,
    pub digest: ContentDigest,
}

impl AuditEvent {
    /// Whether this event is a committed transition.
    pub fn is_transition(&self) -> bool {
        self.event_type == AuditEventType::StateTransition
    }

    /// Whether this event carries an ensemble decision with a rule match,
    /// i.e. an automated decision that simulation can replay.
    pub fn is_decision(&self) -> bool {
        self.agent_recommendation.is_some() && self.policy_rule_matched.is_some()
    }
}
