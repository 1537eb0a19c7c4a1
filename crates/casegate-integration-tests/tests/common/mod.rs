//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use casegate_audit::InMemoryAuditStore;
use casegate_core::{
    ActionType, Actor, Case, CaseId, EvidenceSnapshot, ManualClock, Timestamp,
};
use casegate_ensemble::{AgentRecommendation, AgentUnavailableError, RecommendationAgent};
use casegate_policy::{Policy, PolicyRegistry};
use casegate_state::{DecisionPipeline, EngineConfig, NewCase, TransitionController};

pub const KYC_V1: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../policies/kyc_v1.yaml"
));
pub const KYC_V2: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../policies/kyc_v2.yaml"
));

pub fn t0() -> Timestamp {
    Timestamp::parse("2026-03-02T09:00:00Z").unwrap()
}

/// Answers with a fixed recommendation.
pub struct ScriptedAgent(pub AgentRecommendation);

#[async_trait]
impl RecommendationAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.0.agent_name
    }

    fn version(&self) -> &str {
        &self.0.agent_version
    }

    async fn recommend(
        &self,
        _case_id: CaseId,
        _evidence: &EvidenceSnapshot,
    ) -> Result<AgentRecommendation, AgentUnavailableError> {
        Ok(self.0.clone())
    }
}

pub fn rec(name: &str, action: ActionType, confidence: f64, risk: f64) -> AgentRecommendation {
    let reasoning = format!("{name} reviewed the file.");
    AgentRecommendation::new(name, "1.0", action, confidence, risk, reasoning)
}

/// The four-agent mid-band case: three approvals and a flagged manual review.
pub fn mid_band_recs() -> Vec<AgentRecommendation> {
    vec![
        rec("identity_agent", ActionType::Approve, 0.95, 30.0),
        rec("fraud_agent", ActionType::Approve, 0.89, 30.0),
        rec("compliance_agent", ActionType::Approve, 0.98, 30.0),
        rec("risk_agent", ActionType::ManualReview, 0.72, 85.0).with_flag("address_unverified"),
    ]
}

pub fn sanctions_hit() -> EvidenceSnapshot {
    EvidenceSnapshot::new().with(
        "compliance",
        serde_json::json!({"sanctions_screening": {"status": "hit", "list": "OFAC"}}),
    )
}

pub fn registry() -> Arc<PolicyRegistry> {
    let registry = PolicyRegistry::new();
    registry.register(Policy::from_yaml_str(KYC_V1).unwrap()).unwrap();
    registry.register(Policy::from_yaml_str(KYC_V2).unwrap()).unwrap();
    Arc::new(registry)
}

pub fn customer() -> Actor {
    Actor::api("portal", "customer")
}

pub fn reviewer() -> Actor {
    Actor::human("alice", "reviewer")
}

/// A pipeline over fresh in-memory stores and a manual clock.
pub struct Harness {
    pub pipeline: DecisionPipeline,
    pub audit: Arc<InMemoryAuditStore>,
    pub registry: Arc<PolicyRegistry>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(recs: Vec<AgentRecommendation>) -> Self {
        let audit = Arc::new(InMemoryAuditStore::new());
        let registry = registry();
        let clock = Arc::new(ManualClock::new(t0()));
        let controller = TransitionController::new(audit.clone(), registry.clone(), clock.clone());
        let agents = recs
            .into_iter()
            .map(|r| Arc::new(ScriptedAgent(r)) as Arc<dyn RecommendationAgent>)
            .collect();
        let pipeline =
            DecisionPipeline::new(Arc::new(controller), agents, EngineConfig::default()).unwrap();
        Self {
            pipeline,
            audit,
            registry,
            clock,
        }
    }

    pub fn controller(&self) -> &TransitionController {
        self.pipeline.controller()
    }

    /// Create and submit a KYC case.
    pub fn submitted_case(&self, new_case: NewCase) -> Case {
        let case = self.pipeline.create_case(new_case, customer()).unwrap();
        self.clock.advance_millis(1_000);
        self.pipeline.submit(&case.case_id, customer()).unwrap()
    }
}
