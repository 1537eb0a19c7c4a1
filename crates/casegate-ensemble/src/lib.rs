//! # casegate-ensemble — Ensemble Voting Engine
//!
//! Combines N independently produced agent recommendations into one
//! [`EnsembleDecision`] under the policy's voting strategy.
//!
//! ## Architecture
//!
//! - **Recommendation** (`recommendation.rs`): the immutable agent output
//!   and the abstention produced when an agent times out or errors.
//!
//! - **Config** (`config.rs`): [`VotingStrategyConfig`] as authored in a
//!   policy: strategy, per-agent weights, risk thresholds, and the
//!   mid-band flag floor.
//!
//! - **Engine** (`engine.rs`): deterministic synthesis. Recommendations
//!   are sorted by agent name before any arithmetic so arrival order from
//!   parallel agents never changes the result.
//!
//! - **Gather** (`gather.rs`): bounded-wait fan-out over agent
//!   invocations. Every invocation is individually cancelled at the SLA
//!   deadline and converted into an abstention.
//!
//! ## Crate Policy
//!
//! - Agent failures never escape this crate as errors; they become
//!   abstentions with a synthetic `agent_unavailable:<name>` flag.
//! - Depends only on `casegate-core` internally.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod gather;
pub mod recommendation;

pub use config::{VotingStrategy, VotingStrategyConfig};
pub use decision::{ConsensusLevel, EnsembleDecision, FinalRecommendation, RiskBand, VotingDetails};
pub use engine::EnsembleEngine;
pub use error::{AgentUnavailableError, EnsembleError};
pub use gather::{gather_recommendations, AgentOutcome, RecommendationAgent};
pub use recommendation::{AgentRecommendation, UNAVAILABLE_FLAG_PREFIX};
