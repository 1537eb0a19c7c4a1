//! # Process Subcommand
//!
//! Drives a single case through the full decision pipeline using scripted
//! agents that replay recorded recommendations. The resulting case,
//! decision, matched rule, and review assignment are printed; the audit
//! history can be exported for `casegate history` and `casegate simulate`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde::Serialize;

use casegate_audit::InMemoryAuditStore;
use casegate_core::{Actor, Case, CaseId, CasePriority, EvidenceSnapshot, SystemClock};
use casegate_ensemble::{
    AgentRecommendation, AgentUnavailableError, EnsembleDecision, RecommendationAgent,
};
use casegate_policy::RuleMatch;
use casegate_state::{
    DecisionPipeline, EngineConfig, NewCase, ProcessingOutcome, ReviewAssignment,
    TransitionController,
};

/// Arguments for the `casegate process` subcommand.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Policy documents to register; those marked `active` are activated.
    #[arg(long = "policy", value_name = "POLICY", required = true)]
    pub policies: Vec<PathBuf>,

    /// Business vertical of the new case.
    #[arg(long, default_value = "kyc")]
    pub vertical: String,

    /// Case priority: low, normal, high, or urgent.
    #[arg(long, default_value = "normal", value_parser = parse_priority)]
    pub priority: CasePriority,

    /// JSON array of recommendations, one per scripted agent.
    #[arg(long)]
    pub recommendations: PathBuf,

    /// Evidence snapshot JSON (empty if omitted).
    #[arg(long)]
    pub evidence: Option<PathBuf>,

    /// Write the case's audit history here.
    #[arg(long)]
    pub history_out: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn parse_priority(s: &str) -> Result<CasePriority, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown priority {s:?}; expected low, normal, high, or urgent"))
}

/// An agent that answers with a prerecorded recommendation.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    recommendation: AgentRecommendation,
}

impl ScriptedAgent {
    pub fn new(recommendation: AgentRecommendation) -> Self {
        Self { recommendation }
    }
}

#[async_trait]
impl RecommendationAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.recommendation.agent_name
    }

    fn version(&self) -> &str {
        &self.recommendation.agent_version
    }

    async fn recommend(
        &self,
        _case_id: CaseId,
        _evidence: &EvidenceSnapshot,
    ) -> Result<AgentRecommendation, AgentUnavailableError> {
        Ok(self.recommendation.clone())
    }
}

#[derive(Debug, Serialize)]
struct ProcessReport {
    case: Case,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<EnsembleDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule_match: Option<RuleMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment: Option<ReviewAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl From<ProcessingOutcome> for ProcessReport {
    fn from(outcome: ProcessingOutcome) -> Self {
        Self {
            case: outcome.case,
            decision: outcome.decision,
            rule_match: outcome.rule_match,
            assignment: outcome.assignment,
            failure: outcome.failure,
        }
    }
}

/// Execute the process subcommand.
///
/// Returns exit code 1 if the automated path was abandoned and the case
/// was routed to review because of a processing failure.
pub fn run_process(args: &ProcessArgs, config: &EngineConfig) -> Result<u8> {
    let registry = Arc::new(crate::load_registry(&args.policies)?);
    let recommendations: Vec<AgentRecommendation> = crate::read_json(&args.recommendations)?;
    let evidence = match &args.evidence {
        Some(path) => crate::read_json(path)?,
        None => EvidenceSnapshot::new(),
    };

    let audit = Arc::new(InMemoryAuditStore::new());
    let controller = TransitionController::new(audit.clone(), registry, Arc::new(SystemClock));
    let agents: Vec<Arc<dyn RecommendationAgent>> = recommendations
        .into_iter()
        .map(|rec| Arc::new(ScriptedAgent::new(rec)) as Arc<dyn RecommendationAgent>)
        .collect();
    let pipeline = DecisionPipeline::new(Arc::new(controller), agents, config.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let outcome: ProcessingOutcome = runtime.block_on(async {
        let intake = Actor::api("casegate-cli", "api");
        let case = pipeline.create_case(
            NewCase::new(args.vertical.as_str()).with_priority(args.priority),
            intake.clone(),
        )?;
        pipeline.submit(&case.case_id, intake)?;
        pipeline.process(&case.case_id, evidence).await
    })?;

    let failed = outcome.is_failure();
    if let Some(reason) = &outcome.failure {
        tracing::warn!(
            case_id = %outcome.case.case_id,
            status = %outcome.case.status,
            "automated decision abandoned: {reason}"
        );
    }

    crate::emit_json(&ProcessReport::from(outcome), args.out.as_deref())?;
    if let Some(path) = &args.history_out {
        crate::emit_json(&audit.export(), Some(path))?;
    }
    Ok(if failed { 1 } else { 0 })
}
