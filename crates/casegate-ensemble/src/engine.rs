//! # Ensemble Engine
//!
//! Deterministic synthesis of agent recommendations.
//!
//! ## Strategies
//!
//! - **Weighted**: the action with the greatest summed weight wins.
//!   Confidence and risk are weight-averaged; flags are unioned.
//! - **Conservative**: the most severe action present wins. Confidence is
//!   the minimum confidence among the agents that voted for it.
//! - **Risk-weighted**: banded on the weighted risk score. High band
//!   approves only on unanimous approval and otherwise floors at
//!   `manual_review`. Low band takes the unweighted plurality. Mid band is
//!   weighted, with any risk flag raising the outcome to the configured
//!   floor.
//!
//! Every tie is broken toward the more severe action.

use std::collections::{BTreeMap, BTreeSet};

use casegate_core::{ActionType, CaseId, EnsembleId, Timestamp};

use crate::config::{VotingStrategy, VotingStrategyConfig};
use crate::decision::{
    ConsensusLevel, EnsembleDecision, FinalRecommendation, RiskBand, VotingDetails,
};
use crate::error::EnsembleError;
use crate::recommendation::AgentRecommendation;

/// Tolerance for comparing summed weights.
const EPSILON: f64 = 1e-9;

/// Combines recommendations under one voting configuration.
#[derive(Debug, Clone)]
pub struct EnsembleEngine {
    config: VotingStrategyConfig,
}

impl EnsembleEngine {
    /// Create an engine after validating the configuration.
    pub fn new(config: VotingStrategyConfig) -> Result<Self, EnsembleError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VotingStrategyConfig {
        &self.config
    }

    /// Synthesize one decision from the recommendations of one cycle.
    ///
    /// Weights carried on the input are replaced by the configured ones and
    /// the recommendations are sorted by agent name before any arithmetic.
    pub fn synthesize(
        &self,
        case_id: CaseId,
        recommendations: Vec<AgentRecommendation>,
        decided_at: Timestamp,
    ) -> Result<EnsembleDecision, EnsembleError> {
        let recommendations = self.prepare(recommendations)?;
        let tally = Tally::new(&recommendations);

        let (action, risk_band, flag_override_applied) = match self.config.strategy {
            VotingStrategy::Weighted => (tally.weighted_winner(), None, false),
            VotingStrategy::Conservative => (tally.most_severe(), None, false),
            VotingStrategy::RiskWeighted => self.risk_weighted(&tally),
        };

        let confidence = match self.config.strategy {
            VotingStrategy::Conservative => tally.min_confidence_for(action),
            _ => tally.weighted_confidence,
        };

        let voting_details = VotingDetails {
            vote_counts: tally.counts.clone(),
            vote_weights: tally.weights.clone(),
            total_weight: tally.total_weight,
            weighted_confidence: tally.weighted_confidence,
            consensus_level: tally.consensus(),
            risk_band,
            flag_override_applied,
            abstentions: recommendations
                .iter()
                .filter(|r| r.is_abstention())
                .map(|r| r.agent_name.clone())
                .collect(),
        };

        let reasoning = synthesize_reasoning(action, &recommendations, flag_override_applied);

        tracing::debug!(
            case_id = %case_id,
            strategy = %self.config.strategy,
            action = %action,
            confidence,
            risk_score = tally.risk_score,
            consensus = %voting_details.consensus_level,
            flag_override_applied,
            "ensemble decision synthesized"
        );

        Ok(EnsembleDecision {
            ensemble_id: EnsembleId::new(),
            case_id,
            voting_strategy: self.config.strategy,
            final_recommendation: FinalRecommendation {
                action,
                confidence,
                reasoning,
                risk_score: tally.risk_score,
                risk_flags: tally.flags.clone(),
                voting_details,
            },
            recommendations,
            decided_at,
        })
    }

    fn prepare(
        &self,
        mut recommendations: Vec<AgentRecommendation>,
    ) -> Result<Vec<AgentRecommendation>, EnsembleError> {
        if recommendations.is_empty() {
            return Err(EnsembleError::NoRecommendations);
        }
        for rec in &mut recommendations {
            rec.validate()?;
            rec.weight = self.config.weight_for(&rec.agent_name);
        }
        recommendations.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
        if let Some(pair) = recommendations
            .windows(2)
            .find(|pair| pair[0].agent_name == pair[1].agent_name)
        {
            return Err(EnsembleError::DuplicateAgent {
                agent_name: pair[0].agent_name.clone(),
            });
        }
        Ok(recommendations)
    }

    fn risk_weighted(&self, tally: &Tally<'_>) -> (ActionType, Option<RiskBand>, bool) {
        let risk = tally.risk_score;
        if risk >= self.config.high_risk_threshold {
            let all_approve = tally.counts.keys().all(|a| *a == ActionType::Approve);
            let action = if all_approve {
                ActionType::Approve
            } else {
                ActionType::most_severe(
                    tally.counts.keys().copied().filter(|a| *a != ActionType::Approve),
                )
                .unwrap_or(ActionType::ManualReview)
                .max_severity(ActionType::ManualReview)
            };
            return (action, Some(RiskBand::High), false);
        }
        if risk <= self.config.low_risk_threshold {
            return (tally.plurality_winner(), Some(RiskBand::Low), false);
        }

        let weighted = tally.weighted_winner();
        match self.config.mid_band_flag_floor {
            Some(floor) if !tally.flags.is_empty() && weighted.severity() < floor.severity() => {
                (floor, Some(RiskBand::Mid), true)
            }
            _ => (weighted, Some(RiskBand::Mid), false),
        }
    }
}

// ── Tally ───────────────────────────────────────────────────────────

struct Tally<'a> {
    recommendations: &'a [AgentRecommendation],
    counts: BTreeMap<ActionType, usize>,
    weights: BTreeMap<ActionType, f64>,
    total_weight: f64,
    weighted_confidence: f64,
    risk_score: f64,
    flags: BTreeSet<String>,
}

impl<'a> Tally<'a> {
    fn new(recommendations: &'a [AgentRecommendation]) -> Self {
        let mut counts = BTreeMap::new();
        let mut weights = BTreeMap::new();
        let mut flags = BTreeSet::new();
        let mut total_weight = 0.0;
        let mut confidence_sum = 0.0;
        let mut risk_sum = 0.0;

        for rec in recommendations {
            *counts.entry(rec.action).or_insert(0) += 1;
            *weights.entry(rec.action).or_insert(0.0) += rec.weight;
            flags.extend(rec.risk_flags.iter().cloned());
            total_weight += rec.weight;
            confidence_sum += rec.confidence * rec.weight;
            risk_sum += rec.risk_score * rec.weight;
        }

        // All-zero weights fall back to plain means.
        let (weighted_confidence, risk_score) = if total_weight > EPSILON {
            (confidence_sum / total_weight, risk_sum / total_weight)
        } else {
            let n = recommendations.len().max(1) as f64;
            (
                recommendations.iter().map(|r| r.confidence).sum::<f64>() / n,
                recommendations.iter().map(|r| r.risk_score).sum::<f64>() / n,
            )
        };

        Self {
            recommendations,
            counts,
            weights,
            total_weight,
            weighted_confidence: weighted_confidence.clamp(0.0, 1.0),
            risk_score: risk_score.clamp(0.0, 100.0),
            flags,
        }
    }

    fn weighted_winner(&self) -> ActionType {
        pick_leader(self.weights.iter().map(|(a, w)| (*a, *w)))
    }

    fn plurality_winner(&self) -> ActionType {
        pick_leader(self.counts.iter().map(|(a, c)| (*a, *c as f64)))
    }

    fn most_severe(&self) -> ActionType {
        ActionType::most_severe(self.counts.keys().copied()).unwrap_or(ActionType::ManualReview)
    }

    fn min_confidence_for(&self, action: ActionType) -> f64 {
        self.recommendations
            .iter()
            .filter(|r| r.action == action)
            .map(|r| r.confidence)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    fn consensus(&self) -> ConsensusLevel {
        let unanimous = self.counts.len() == 1;
        let leading_share = if self.total_weight > EPSILON {
            self.weights.values().copied().fold(0.0, f64::max) / self.total_weight
        } else {
            let n = self.recommendations.len().max(1) as f64;
            self.counts.values().copied().max().unwrap_or(0) as f64 / n
        };
        ConsensusLevel::classify(leading_share, unanimous)
    }
}

/// Highest score wins; ties (within [`EPSILON`]) go to the more severe action.
fn pick_leader(scores: impl Iterator<Item = (ActionType, f64)>) -> ActionType {
    let mut leader: Option<(ActionType, f64)> = None;
    for (action, score) in scores {
        leader = match leader {
            None => Some((action, score)),
            Some((current, best)) => {
                let tied = (score - best).abs() <= EPSILON;
                if score > best + EPSILON || (tied && action.severity() > current.severity()) {
                    Some((action, score))
                } else {
                    Some((current, best))
                }
            }
        };
    }
    leader.map(|(a, _)| a).unwrap_or(ActionType::ManualReview)
}

// ── Reasoning ───────────────────────────────────────────────────────

fn synthesize_reasoning(
    action: ActionType,
    recommendations: &[AgentRecommendation],
    flag_override_applied: bool,
) -> String {
    let parts: Vec<String> = recommendations
        .iter()
        .map(|r| {
            format!(
                "{} ({}, {:.0}% confident): {}",
                display_name(&r.agent_name),
                r.action,
                r.confidence * 100.0,
                first_sentence(&r.reasoning)
            )
        })
        .collect();
    let mut reasoning = format!("Ensemble decision: {action}. {}", parts.join(" | "));
    if flag_override_applied {
        reasoning.push_str(&format!(
            " Risk flags in the mid risk band raised the outcome to {action}."
        ));
    }
    reasoning
}

/// `"identity_agent"` becomes `"Identity"`.
fn display_name(agent_name: &str) -> String {
    agent_name
        .strip_suffix("_agent")
        .unwrap_or(agent_name)
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.split_once('.') {
        Some((head, _)) if !head.trim().is_empty() => head.trim(),
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(name: &str, action: ActionType, confidence: f64, risk: f64) -> AgentRecommendation {
        let reasoning = format!("{name} says {action}. More.");
        AgentRecommendation::new(name, "1.0", action, confidence, risk, reasoning)
    }

    fn scenario_config(strategy: VotingStrategy) -> VotingStrategyConfig {
        VotingStrategyConfig::new(strategy)
            .with_weight("compliance_agent", 2.0)
            .with_weight("risk_agent", 1.5)
    }

    fn scenario_recs() -> Vec<AgentRecommendation> {
        vec![
            rec("risk_agent", ActionType::ManualReview, 0.72, 85.0).with_flag("address_unverified"),
            rec("identity_agent", ActionType::Approve, 0.95, 30.0),
            rec("fraud_agent", ActionType::Approve, 0.89, 30.0),
            rec("compliance_agent", ActionType::Approve, 0.98, 30.0),
        ]
    }

    fn synth(config: VotingStrategyConfig, recs: Vec<AgentRecommendation>) -> EnsembleDecision {
        EnsembleEngine::new(config)
            .unwrap()
            .synthesize(CaseId::new(), recs, Timestamp::now())
            .unwrap()
    }

    #[test]
    fn test_mid_band_flag_override() {
        let decision = synth(scenario_config(VotingStrategy::RiskWeighted), scenario_recs());
        let fin = &decision.final_recommendation;
        assert_eq!(fin.action, ActionType::ManualReview);
        assert!((fin.risk_score - 45.0).abs() < 1e-9);
        assert!((fin.confidence - 4.88 / 5.5).abs() < 1e-9);
        assert!(fin.voting_details.flag_override_applied);
        assert_eq!(fin.voting_details.risk_band, Some(RiskBand::Mid));
        assert!(fin.risk_flags.contains("address_unverified"));
    }

    #[test]
    fn test_mid_band_without_floor_follows_weighted_vote() {
        let mut config = scenario_config(VotingStrategy::RiskWeighted);
        config.mid_band_flag_floor = None;
        let decision = synth(config, scenario_recs());
        assert_eq!(decision.action(), ActionType::Approve);
        assert!(!decision.final_recommendation.voting_details.flag_override_applied);
    }

    #[test]
    fn test_low_band_all_approve() {
        let recs = scenario_recs()
            .into_iter()
            .map(|mut r| {
                r.action = ActionType::Approve;
                r.risk_score = 15.0;
                r.risk_flags.clear();
                r
            })
            .collect();
        let decision = synth(scenario_config(VotingStrategy::RiskWeighted), recs);
        assert_eq!(decision.action(), ActionType::Approve);
        assert_eq!(decision.consensus_level(), ConsensusLevel::Unanimous);
        assert_eq!(decision.final_recommendation.voting_details.risk_band, Some(RiskBand::Low));
        assert!(!decision.final_recommendation.voting_details.flag_override_applied);
    }

    #[test]
    fn test_high_band_disagreement_never_approves() {
        let recs = vec![
            rec("a_agent", ActionType::Approve, 0.99, 90.0),
            rec("b_agent", ActionType::Approve, 0.99, 90.0),
            rec("c_agent", ActionType::RequestMoreInfo, 0.5, 90.0),
        ];
        let decision = synth(VotingStrategyConfig::new(VotingStrategy::RiskWeighted), recs);
        assert_eq!(decision.action(), ActionType::ManualReview);
        assert_eq!(decision.final_recommendation.voting_details.risk_band, Some(RiskBand::High));
    }

    #[test]
    fn test_high_band_unanimous_approve() {
        let recs = vec![
            rec("a_agent", ActionType::Approve, 0.9, 80.0),
            rec("b_agent", ActionType::Approve, 0.8, 80.0),
        ];
        let decision = synth(VotingStrategyConfig::new(VotingStrategy::RiskWeighted), recs);
        assert_eq!(decision.action(), ActionType::Approve);
    }

    #[test]
    fn test_weighted_tie_breaks_toward_severity() {
        let recs = vec![
            rec("a_agent", ActionType::Approve, 0.9, 10.0),
            rec("b_agent", ActionType::Reject, 0.9, 10.0),
        ];
        let decision = synth(VotingStrategyConfig::new(VotingStrategy::Weighted), recs);
        assert_eq!(decision.action(), ActionType::Reject);
    }

    #[test]
    fn test_conservative_uses_min_confidence_of_most_severe() {
        let recs = vec![
            rec("a_agent", ActionType::Approve, 0.99, 10.0),
            rec("b_agent", ActionType::Escalate, 0.8, 10.0),
            rec("c_agent", ActionType::Escalate, 0.6, 10.0),
        ];
        let decision = synth(VotingStrategyConfig::new(VotingStrategy::Conservative), recs);
        assert_eq!(decision.action(), ActionType::Escalate);
        assert!((decision.confidence() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weights_come_from_config_and_order_is_stable() {
        let mut recs = scenario_recs();
        for r in &mut recs {
            r.weight = 100.0;
        }
        let decision = synth(scenario_config(VotingStrategy::Weighted), recs);
        let names: Vec<_> = decision
            .recommendations
            .iter()
            .map(|r| r.agent_name.as_str())
            .collect();
        assert_eq!(names, ["compliance_agent", "fraud_agent", "identity_agent", "risk_agent"]);
        assert_eq!(decision.recommendations[0].weight, 2.0);
        assert_eq!(decision.recommendations[3].weight, 1.5);
    }

    #[test]
    fn test_abstention_counts_weight_and_flag() {
        let recs = vec![
            rec("identity_agent", ActionType::Approve, 0.9, 20.0),
            AgentRecommendation::abstention("fraud_agent", "1.0", "timeout"),
        ];
        let decision = synth(VotingStrategyConfig::new(VotingStrategy::Weighted), recs);
        let fin = &decision.final_recommendation;
        assert!((fin.confidence - 0.45).abs() < 1e-12);
        assert!((fin.risk_score - 60.0).abs() < 1e-12);
        assert!(fin.risk_flags.contains("agent_unavailable:fraud_agent"));
        assert_eq!(fin.voting_details.abstentions, vec!["fraud_agent".to_string()]);
        // Tied at weight 1.0 each: severity wins.
        assert_eq!(fin.action, ActionType::ManualReview);
    }

    #[test]
    fn test_reasoning_format() {
        let decision = synth(scenario_config(VotingStrategy::RiskWeighted), scenario_recs());
        let reasoning = &decision.final_recommendation.reasoning;
        assert!(reasoning.starts_with(
            "Ensemble decision: manual_review. \
             Compliance (approve, 98% confident): compliance_agent says approve | "
        ));
        assert!(reasoning
            .contains("Risk (manual_review, 72% confident): risk_agent says manual_review"));
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        let engine = EnsembleEngine::new(VotingStrategyConfig::default()).unwrap();
        assert_eq!(
            engine.synthesize(CaseId::new(), vec![], Timestamp::now()).unwrap_err(),
            EnsembleError::NoRecommendations
        );
        let dup = vec![
            rec("a_agent", ActionType::Approve, 0.9, 10.0),
            rec("a_agent", ActionType::Reject, 0.9, 10.0),
        ];
        assert!(matches!(
            engine.synthesize(CaseId::new(), dup, Timestamp::now()),
            Err(EnsembleError::DuplicateAgent { .. })
        ));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("identity_agent"), "Identity");
        assert_eq!(display_name("sanctions_list_agent"), "Sanctions List");
        assert_eq!(display_name("ocr"), "Ocr");
    }

    fn arb_action() -> impl Strategy<Value = ActionType> {
        prop::sample::select(ActionType::ALL.to_vec())
    }

    fn arb_recs() -> impl Strategy<Value = Vec<AgentRecommendation>> {
        prop::collection::vec((arb_action(), 0.0f64..=1.0, 0.0f64..=100.0), 1..8).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (action, conf, risk))| rec(&format!("agent_{i}"), action, conf, risk))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_confidence_in_unit_interval(
            recs in arb_recs(),
            weights in prop::collection::vec(0.0f64..5.0, 8),
        ) {
            let mut config = VotingStrategyConfig::new(VotingStrategy::Weighted);
            for (i, w) in weights.iter().enumerate() {
                config = config.with_weight(format!("agent_{i}"), *w);
            }
            let decision = synth(config, recs);
            prop_assert!((0.0..=1.0).contains(&decision.confidence()));
            prop_assert!((0.0..=100.0).contains(&decision.risk_score()));
        }

        #[test]
        fn prop_high_risk_never_approves_without_unanimity(recs in arb_recs()) {
            let all_approve = recs.iter().all(|r| r.action == ActionType::Approve);
            let decision = synth(VotingStrategyConfig::new(VotingStrategy::RiskWeighted), recs);
            if decision.risk_score() >= 70.0 && !all_approve {
                prop_assert_ne!(decision.action(), ActionType::Approve);
            }
        }

        #[test]
        fn prop_arrival_order_irrelevant(recs in arb_recs()) {
            let mut reversed = recs.clone();
            reversed.reverse();
            let config = VotingStrategyConfig::new(VotingStrategy::RiskWeighted);
            let a = synth(config.clone(), recs);
            let b = synth(config, reversed);
            prop_assert_eq!(a.final_recommendation, b.final_recommendation);
            prop_assert_eq!(a.recommendations, b.recommendations);
        }
    }
}
