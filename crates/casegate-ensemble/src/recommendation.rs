//! # Agent Recommendations
//!
//! One [`AgentRecommendation`] per agent per evaluation cycle. The weight
//! field is overwritten by the engine from the policy's voting config; the
//! value an agent puts there is never trusted.

use std::collections::BTreeSet;

use casegate_core::ActionType;
use serde::{Deserialize, Serialize};

use crate::error::EnsembleError;

/// Prefix of the synthetic risk flag attached to abstentions.
pub const UNAVAILABLE_FLAG_PREFIX: &str = "agent_unavailable:";

/// Risk score recorded for an abstaining agent.
const ABSTENTION_RISK_SCORE: f64 = 100.0;

/// The output of a single agent for a single case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecommendation {
    pub agent_name: String,
    pub agent_version: String,
    pub action: ActionType,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    /// In `[0, 100]`.
    pub risk_score: f64,
    #[serde(default)]
    pub risk_flags: BTreeSet<String>,
    /// Assigned by policy.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl AgentRecommendation {
    /// Build a recommendation with weight 1.0 and no flags.
    pub fn new(
        agent_name: impl Into<String>,
        agent_version: impl Into<String>,
        action: ActionType,
        confidence: f64,
        risk_score: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_version: agent_version.into(),
            action,
            confidence,
            reasoning: reasoning.into(),
            risk_score,
            risk_flags: BTreeSet::new(),
            weight: default_weight(),
        }
    }

    /// Add a risk flag.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.risk_flags.insert(flag.into());
        self
    }

    /// The abstention recorded for an agent that timed out or errored.
    pub fn abstention(
        agent_name: impl Into<String>,
        agent_version: impl Into<String>,
        cause: &str,
    ) -> Self {
        let agent_name = agent_name.into();
        let flag = format!("{UNAVAILABLE_FLAG_PREFIX}{agent_name}");
        Self {
            reasoning: format!("Agent unavailable ({cause}); abstaining with manual review."),
            agent_name,
            agent_version: agent_version.into(),
            action: ActionType::ManualReview,
            confidence: 0.0,
            risk_score: ABSTENTION_RISK_SCORE,
            risk_flags: BTreeSet::from([flag]),
            weight: default_weight(),
        }
    }

    /// Whether this recommendation is a synthesized abstention.
    pub fn is_abstention(&self) -> bool {
        self.risk_flags
            .iter()
            .any(|f| f.starts_with(UNAVAILABLE_FLAG_PREFIX))
    }

    /// Reject NaN and out-of-range scores.
    pub fn validate(&self) -> Result<(), EnsembleError> {
        let invalid = |reason: String| EnsembleError::InvalidRecommendation {
            agent_name: self.agent_name.clone(),
            reason,
        };
        if self.agent_name.is_empty() {
            return Err(invalid("agent_name is empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid(format!("confidence {} outside [0, 1]", self.confidence)));
        }
        if !(0.0..=100.0).contains(&self.risk_score) {
            return Err(invalid(format!("risk_score {} outside [0, 100]", self.risk_score)));
        }
        Ok(())
    }
}
