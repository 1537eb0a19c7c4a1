//! # Agent Fan-out
//!
//! Invokes every agent for a case concurrently and waits until each has
//! either answered or reached the shared SLA deadline. Late invocations
//! are aborted and their eventual results discarded; failed, panicked,
//! late, or malformed answers all become abstentions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casegate_core::{CaseId, EvidenceSnapshot};
use tokio::time::Instant;

use crate::error::AgentUnavailableError;
use crate::recommendation::AgentRecommendation;

/// An independently implemented recommendation producer.
#[async_trait]
pub trait RecommendationAgent: Send + Sync {
    /// Stable agent name used for weighting and ordering.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Analyze the evidence for one case.
    async fn recommend(
        &self,
        case_id: CaseId,
        evidence: &EvidenceSnapshot,
    ) -> Result<AgentRecommendation, AgentUnavailableError>;
}

/// What happened to one agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Responded(AgentRecommendation),
    TimedOut {
        agent_name: String,
        agent_version: String,
    },
    Failed {
        agent_name: String,
        agent_version: String,
        reason: String,
    },
}

impl AgentOutcome {
    pub fn agent_name(&self) -> &str {
        match self {
            Self::Responded(rec) => &rec.agent_name,
            Self::TimedOut { agent_name, .. } | Self::Failed { agent_name, .. } => agent_name,
        }
    }

    pub fn is_abstention(&self) -> bool {
        !matches!(self, Self::Responded(_))
    }

    /// The recommendation to feed into synthesis.
    pub fn into_recommendation(self) -> AgentRecommendation {
        match self {
            Self::Responded(rec) => rec,
            Self::TimedOut {
                agent_name,
                agent_version,
            } => AgentRecommendation::abstention(agent_name, agent_version, "timeout"),
            Self::Failed {
                agent_name,
                agent_version,
                reason,
            } => AgentRecommendation::abstention(agent_name, agent_version, &reason),
        }
    }
}

/// Run all agents in parallel, bounded by `sla`.
///
/// Returns one outcome per agent in the order of `agents`. Never waits
/// longer than `sla` after the call starts, and never leaves an agent task
/// running past that point.
pub async fn gather_recommendations(
    agents: &[Arc<dyn RecommendationAgent>],
    case_id: CaseId,
    evidence: Arc<EvidenceSnapshot>,
    sla: Duration,
) -> Vec<AgentOutcome> {
    let deadline = Instant::now() + sla;

    let handles: Vec<_> = agents
        .iter()
        .map(|agent| {
            let agent = Arc::clone(agent);
            let evidence = Arc::clone(&evidence);
            tokio::spawn(async move { agent.recommend(case_id, &evidence).await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(agents.len());
    for (agent, mut handle) in agents.iter().zip(handles) {
        let agent_name = agent.name().to_string();
        let agent_version = agent.version().to_string();

        let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(Ok(mut rec))) => {
                rec.agent_name = agent_name.clone();
                match rec.validate() {
                    Ok(()) => AgentOutcome::Responded(rec),
                    Err(err) => AgentOutcome::Failed {
                        agent_name,
                        agent_version,
                        reason: err.to_string(),
                    },
                }
            }
            Ok(Ok(Err(err))) => AgentOutcome::Failed {
                agent_name,
                agent_version,
                reason: err.reason,
            },
            Ok(Err(join_err)) => AgentOutcome::Failed {
                agent_name,
                agent_version,
                reason: format!("agent task aborted: {join_err}"),
            },
            Err(_elapsed) => {
                handle.abort();
                AgentOutcome::TimedOut {
                    agent_name,
                    agent_version,
                }
            }
        };

        match &outcome {
            AgentOutcome::Responded(rec) => tracing::debug!(
                case_id = %case_id,
                agent = %rec.agent_name,
                action = %rec.action,
                confidence = rec.confidence,
                "agent responded"
            ),
            AgentOutcome::TimedOut { agent_name, .. } => tracing::warn!(
                case_id = %case_id,
                agent = %agent_name,
                sla_ms = sla.as_millis() as u64,
                "agent exceeded SLA, recording abstention"
            ),
            AgentOutcome::Failed {
                agent_name, reason, ..
            } => tracing::warn!(
                case_id = %case_id,
                agent = %agent_name,
                reason = %reason,
                "agent failed, recording abstention"
            ),
        }
        outcomes.push(outcome);
    }
    outcomes
}
