//! # Vote Subcommand
//!
//! Runs the ensemble engine of one policy over a recorded set of agent
//! recommendations and prints the resulting decision, including the
//! voting details.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use casegate_core::{CaseId, Timestamp};
use casegate_ensemble::{AgentRecommendation, EnsembleDecision};
use casegate_policy::ValidatedPolicy;

/// Arguments for the `casegate vote` subcommand.
#[derive(Args, Debug)]
pub struct VoteArgs {
    /// Policy whose voting strategy to apply.
    #[arg(long)]
    pub policy: PathBuf,

    /// JSON array of agent recommendations.
    #[arg(long)]
    pub recommendations: PathBuf,

    /// Case the decision is attributed to (random if omitted).
    #[arg(long)]
    pub case_id: Option<CaseId>,

    /// Write the decision here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute the vote subcommand.
pub fn run_vote(args: &VoteArgs) -> Result<u8> {
    let policy = ValidatedPolicy::new(crate::load_policy(&args.policy)?)?;
    let recommendations: Vec<AgentRecommendation> = crate::read_json(&args.recommendations)?;
    let case_id = args.case_id.unwrap_or_default();

    let decision = synthesize(&policy, case_id, recommendations)?;
    tracing::info!(
        policy_id = %policy.policy_id(),
        action = %decision.action(),
        confidence = decision.confidence(),
        risk_score = decision.risk_score(),
        "ensemble decision"
    );
    crate::emit_json(&decision, args.out.as_deref())?;
    Ok(0)
}

/// Synthesize a decision stamped with the current time.
pub(crate) fn synthesize(
    policy: &ValidatedPolicy,
    case_id: CaseId,
    recommendations: Vec<AgentRecommendation>,
) -> Result<EnsembleDecision> {
    policy
        .ensemble_engine()
        .synthesize(case_id, recommendations, Timestamp::now())
        .with_context(|| format!("ensemble synthesis under {} failed", policy.policy_id()))
}
