//! # Engine Configuration
//!
//! Runtime knobs for the decision pipeline. Policy content (rules, voting,
//! transition tables) is never configured here; it lives in the policy
//! documents.
//!
//! ```yaml
//! agent_sla_ms: 30000
//! review_state: under_review.manual_review
//! auto_actor_role: workflow_engine
//! record_rejected_transitions: true
//! ```

use std::time::Duration;

use casegate_core::{CaseStatus, ReviewStage};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Environment variable overriding [`EngineConfig::agent_sla_ms`].
pub const AGENT_SLA_ENV: &str = "CASEGATE_AGENT_SLA_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shared deadline for one round of agent recommendations.
    pub agent_sla_ms: u64,
    /// Where manual-review and escalate decisions, and failed processing,
    /// route a case.
    pub review_state: CaseStatus,
    /// Role the pipeline acts under when applying an automated decision.
    pub auto_actor_role: String,
    /// Record refused transition requests as `transition.rejected` events.
    pub record_rejected_transitions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_sla_ms: 30_000,
            review_state: CaseStatus::UnderReview(Some(ReviewStage::ManualReview)),
            auto_actor_role: "workflow_engine".to_string(),
            record_rejected_transitions: true,
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_yaml::from_str(s).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply [`AGENT_SLA_ENV`] if it is set.
    pub fn with_env_overrides(self) -> Result<Self, PipelineError> {
        match std::env::var(AGENT_SLA_ENV) {
            Ok(raw) => self.with_agent_sla_override(&raw),
            Err(_) => Ok(self),
        }
    }

    fn with_agent_sla_override(mut self, raw: &str) -> Result<Self, PipelineError> {
        self.agent_sla_ms = raw.trim().parse().map_err(|e| {
            PipelineError::Config(format!(
                "{AGENT_SLA_ENV}={raw:?} is not a millisecond count: {e}"
            ))
        })?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.agent_sla_ms == 0 {
            return Err(PipelineError::Config("agent_sla_ms must be positive".into()));
        }
        if self.review_state.is_terminal() {
            return Err(PipelineError::Config(format!(
                "review_state '{}' is terminal",
                self.review_state
            )));
        }
        if self.auto_actor_role.trim().is_empty() {
            return Err(PipelineError::Config("auto_actor_role is empty".into()));
        }
        Ok(())
    }

    pub fn agent_sla(&self) -> Duration {
        Duration::from_millis(self.agent_sla_ms)
    }
}
