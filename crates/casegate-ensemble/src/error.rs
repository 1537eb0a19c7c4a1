//! # Ensemble Errors

use thiserror::Error;

/// Errors produced while synthesizing an ensemble decision.
///
/// Agent failures are deliberately absent: they are converted into
/// abstentions before synthesis and never surface as error values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// No recommendations (not even abstentions) were supplied.
    #[error("cannot synthesize an ensemble decision from zero recommendations")]
    NoRecommendations,

    /// Two recommendations came from the same agent in one cycle.
    #[error("agent '{agent_name}' produced more than one recommendation in a single cycle")]
    DuplicateAgent { agent_name: String },

    /// A recommendation carried a value outside its domain.
    #[error("invalid recommendation from '{agent_name}': {reason}")]
    InvalidRecommendation { agent_name: String, reason: String },

    /// The voting configuration is inconsistent.
    #[error("invalid voting configuration: {0}")]
    InvalidConfig(String),
}

/// Raised by an agent that cannot produce a recommendation.
///
/// Recovered inside the fan-out as an abstention.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("agent '{agent}' unavailable: {reason}")]
pub struct AgentUnavailableError {
    pub agent: String,
    pub reason: String,
}

impl AgentUnavailableError {
    pub fn new(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: reason.into(),
        }
    }
}
