//! # Ensemble Decision
//!
//! The synthesized output handed to the rule evaluator and recorded on
//! the audit event that triggered the resulting transition.

use std::collections::{BTreeMap, BTreeSet};

use casegate_core::{ActionType, CaseId, EnsembleId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::config::VotingStrategy;
use crate::recommendation::AgentRecommendation;

/// How strongly the agents agreed, independent of the final action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLevel {
    /// Every agent voted the same action.
    Unanimous,
    /// The leading action holds more than 70% of the weight.
    StrongMajority,
    /// The leading action holds more than 50% of the weight.
    Majority,
    Divided,
}

impl ConsensusLevel {
    /// Classify from the leading action's share of the total weight.
    pub fn classify(leading_share: f64, unanimous: bool) -> Self {
        if unanimous {
            Self::Unanimous
        } else if leading_share > 0.7 {
            Self::StrongMajority
        } else if leading_share > 0.5 {
            Self::Majority
        } else {
            Self::Divided
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unanimous => "unanimous",
            Self::StrongMajority => "strong_majority",
            Self::Majority => "majority",
            Self::Divided => "divided",
        }
    }
}

impl std::fmt::Display for ConsensusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of the aggregated risk score relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Mid,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Breakdown of how the final action was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingDetails {
    pub vote_counts: BTreeMap<ActionType, usize>,
    pub vote_weights: BTreeMap<ActionType, f64>,
    pub total_weight: f64,
    pub weighted_confidence: f64,
    pub consensus_level: ConsensusLevel,
    /// Only set by the risk-weighted strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_band: Option<RiskBand>,
    #[serde(default)]
    pub flag_override_applied: bool,
    /// Names of agents that abstained.
    #[serde(default)]
    pub abstentions: Vec<String>,
}

/// The combined recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecommendation {
    pub action: ActionType,
    pub confidence: f64,
    pub reasoning: String,
    pub risk_score: f64,
    pub risk_flags: BTreeSet<String>,
    pub voting_details: VotingDetails,
}

/// One synthesis result for one evaluation cycle of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDecision {
    pub ensemble_id: EnsembleId,
    pub case_id: CaseId,
    pub voting_strategy: VotingStrategy,
    /// Sorted by agent name, with policy-assigned weights.
    pub recommendations: Vec<AgentRecommendation>,
    pub final_recommendation: FinalRecommendation,
    pub decided_at: Timestamp,
}

impl EnsembleDecision {
    pub fn action(&self) -> ActionType {
        self.final_recommendation.action
    }

    pub fn confidence(&self) -> f64 {
        self.final_recommendation.confidence
    }

    pub fn risk_score(&self) -> f64 {
        self.final_recommendation.risk_score
    }

    pub fn consensus_level(&self) -> ConsensusLevel {
        self.final_recommendation.voting_details.consensus_level
    }
}
