//! # Voting Strategy Configuration
//!
//! The `voting_strategy` block of a policy document:
//!
//! ```yaml
//! voting_strategy:
//!   strategy: risk_weighted
//!   agent_weights:
//!     compliance_agent: 2.0
//!     risk_agent: 1.5
//!   high_risk_threshold: 70
//!   low_risk_threshold: 30
//!   mid_band_flag_floor: manual_review
//! ```

use std::collections::BTreeMap;

use casegate_core::ActionType;
use serde::{Deserialize, Serialize};

use crate::error::EnsembleError;

/// How recommendations are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    Weighted,
    Conservative,
    RiskWeighted,
}

impl VotingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Conservative => "conservative",
            Self::RiskWeighted => "risk_weighted",
        }
    }
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voting configuration carried by a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingStrategyConfig {
    pub strategy: VotingStrategy,
    /// Per-agent weights keyed by agent name.
    #[serde(default)]
    pub agent_weights: BTreeMap<String, f64>,
    /// Weight for agents absent from `agent_weights`.
    #[serde(default = "defaults::weight")]
    pub default_weight: f64,
    #[serde(default = "defaults::high_risk")]
    pub high_risk_threshold: f64,
    #[serde(default = "defaults::low_risk")]
    pub low_risk_threshold: f64,
    /// Minimum action when any risk flag is present in the mid band.
    /// `None` disables the override.
    #[serde(default = "defaults::flag_floor")]
    pub mid_band_flag_floor: Option<ActionType>,
}

mod defaults {
    use casegate_core::ActionType;

    pub fn weight() -> f64 {
        1.0
    }
    pub fn high_risk() -> f64 {
        70.0
    }
    pub fn low_risk() -> f64 {
        30.0
    }
    pub fn flag_floor() -> Option<ActionType> {
        Some(ActionType::ManualReview)
    }
}

impl Default for VotingStrategyConfig {
    fn default() -> Self {
        Self::new(VotingStrategy::Weighted)
    }
}

impl VotingStrategyConfig {
    pub fn new(strategy: VotingStrategy) -> Self {
        Self {
            strategy,
            agent_weights: BTreeMap::new(),
            default_weight: defaults::weight(),
            high_risk_threshold: defaults::high_risk(),
            low_risk_threshold: defaults::low_risk(),
            mid_band_flag_floor: defaults::flag_floor(),
        }
    }

    /// Set an agent's weight.
    pub fn with_weight(mut self, agent_name: impl Into<String>, weight: f64) -> Self {
        self.agent_weights.insert(agent_name.into(), weight);
        self
    }

    /// Weight assigned to `agent_name`.
    pub fn weight_for(&self, agent_name: &str) -> f64 {
        self.agent_weights
            .get(agent_name)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Check weights are finite and non-negative and thresholds ordered.
    pub fn validate(&self) -> Result<(), EnsembleError> {
        let bad_weight = |w: f64| !w.is_finite() || w < 0.0;
        if bad_weight(self.default_weight) {
            return Err(EnsembleError::InvalidConfig(format!(
                "default_weight {} must be finite and non-negative",
                self.default_weight
            )));
        }
        if let Some((agent, w)) = self.agent_weights.iter().find(|(_, w)| bad_weight(**w)) {
            return Err(EnsembleError::InvalidConfig(format!(
                "weight {w} for agent '{agent}' must be finite and non-negative"
            )));
        }
        let in_range = |t: f64| (0.0..=100.0).contains(&t);
        if !in_range(self.low_risk_threshold) || !in_range(self.high_risk_threshold) {
            return Err(EnsembleError::InvalidConfig(
                "risk thresholds must lie in [0, 100]".into(),
            ));
        }
        if self.low_risk_threshold > self.high_risk_threshold {
            return Err(EnsembleError::InvalidConfig(format!(
                "low_risk_threshold {} exceeds high_risk_threshold {}",
                self.low_risk_threshold, self.high_risk_threshold
            )));
        }
        Ok(())
    }
}
