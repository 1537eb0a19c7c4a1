//! # Evaluate Subcommand
//!
//! Evaluates a policy's rules, first match by priority, against a case,
//! an ensemble decision and an evidence snapshot. The decision is either
//! read from a file or synthesized on the spot from recommendations.
//!
//! Exit code 1 means no rule matched, which for a policy without a `*`
//! default rule is a governance incident.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use casegate_core::{Case, EvidenceSnapshot, PolicyId};
use casegate_ensemble::{AgentRecommendation, EnsembleDecision};
use casegate_policy::{EvaluationError, RuleEvaluator, RuleMatch, ValidatedPolicy};

/// Arguments for the `casegate evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Policy whose rules to evaluate.
    #[arg(long)]
    pub policy: PathBuf,

    /// Case JSON.
    #[arg(long)]
    pub case: PathBuf,

    /// Ensemble decision JSON.
    #[arg(long, conflicts_with = "recommendations", required_unless_present = "recommendations")]
    pub decision: Option<PathBuf>,

    /// Agent recommendations JSON; synthesized under the policy's voting strategy.
    #[arg(long)]
    pub recommendations: Option<PathBuf>,

    /// Evidence snapshot JSON (empty if omitted).
    #[arg(long)]
    pub evidence: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EvaluationReport<'a> {
    policy_id: &'a PolicyId,
    rule_match: RuleMatch,
    decision: &'a EnsembleDecision,
}

/// Execute the evaluate subcommand.
pub fn run_evaluate(args: &EvaluateArgs) -> Result<u8> {
    let policy = ValidatedPolicy::new(crate::load_policy(&args.policy)?)?;
    let case: Case = crate::read_json(&args.case)?;
    if &case.policy_version != policy.policy_id() {
        tracing::warn!(
            case_id = %case.case_id,
            case_policy = %case.policy_version,
            policy_id = %policy.policy_id(),
            "evaluating a case under a policy other than the one it is bound to"
        );
    }

    let decision = match (&args.decision, &args.recommendations) {
        (Some(path), _) => crate::read_json::<EnsembleDecision>(path)?,
        (None, Some(path)) => {
            let recommendations: Vec<AgentRecommendation> = crate::read_json(path)?;
            crate::vote::synthesize(&policy, case.case_id, recommendations)?
        }
        (None, None) => anyhow::bail!("either --decision or --recommendations is required"),
    };
    let evidence = match &args.evidence {
        Some(path) => crate::read_json(path)?,
        None => EvidenceSnapshot::new(),
    };

    match RuleEvaluator::new(&policy).evaluate_case(&case, &decision, &evidence) {
        Ok(rule_match) => {
            let report = EvaluationReport {
                policy_id: policy.policy_id(),
                rule_match,
                decision: &decision,
            };
            crate::emit_json(&report, args.out.as_deref())?;
            Ok(0)
        }
        Err(e @ EvaluationError::NoRuleMatch { .. }) => {
            println!("NO MATCH: {e}");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use casegate_core::{ActionType, CaseId, CasePriority, CaseStatus, Timestamp};
    use std::collections::BTreeMap;

    fn processing_case() -> Case {
        let now = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        Case {
            case_id: CaseId::new(),
            vertical: "kyc".into(),
            status: CaseStatus::Processing,
            priority: CasePriority::Normal,
            policy_version: PolicyId::new("pol_kyc_v1"),
            sla_deadline: None,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: 3,
        }
    }

    fn args(dir: &std::path::Path, evidence: Option<PathBuf>) -> EvaluateArgs {
        EvaluateArgs {
            policy: fixtures::write(dir, "kyc_v1.yaml", fixtures::KYC_V1),
            case: fixtures::write_json(dir, "case.json", &processing_case()),
            decision: None,
            recommendations: Some(fixtures::write_json(
                dir,
                "recs.json",
                &fixtures::clean_approvals(),
            )),
            evidence,
            out: Some(dir.join("report.json")),
        }
    }

    #[test]
    fn evaluate_clean_case_auto_approves() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(dir.path(), None);
        assert_eq!(run_evaluate(&args).unwrap(), 0);

        let report: serde_json::Value = crate::read_json(&dir.path().join("report.json")).unwrap();
        assert_eq!(report["rule_match"]["rule_name"], "high_confidence_auto_approve");
        assert_eq!(report["policy_id"], "pol_kyc_v1");
    }

    #[test]
    fn evaluate_sanctions_hit_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let evidence = EvidenceSnapshot::new().with(
            "compliance",
            serde_json::json!({"sanctions_screening": {"status": "hit"}}),
        );
        let evidence = fixtures::write_json(dir.path(), "evidence.json", &evidence);
        let args = args(dir.path(), Some(evidence));
        assert_eq!(run_evaluate(&args).unwrap(), 0);

        let report: serde_json::Value = crate::read_json(&dir.path().join("report.json")).unwrap();
        assert_eq!(report["rule_match"]["rule_name"], "sanctions_hit");
        assert_eq!(
            report["rule_match"]["action"],
            serde_json::to_value(ActionType::Escalate).unwrap()
        );
    }

    #[test]
    fn evaluate_reports_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let no_default = fixtures::KYC_V1.replace(
            "condition: \"*\"",
            "condition: \"case.priority == 'never'\"",
        );
        let mut args = args(dir.path(), None);
        args.policy = fixtures::write(dir.path(), "no_default.yaml", &no_default);
        args.recommendations = Some(fixtures::write_json(
            dir.path(),
            "recs.json",
            &vec![AgentRecommendation::new(
                "identity_agent",
                "1.0",
                ActionType::Approve,
                0.8,
                25.0,
                "Mostly fine.",
            )],
        ));
        assert_eq!(run_evaluate(&args).unwrap(), 1);
    }

    #[test]
    fn cli_requires_a_decision_source() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(flatten)]
            args: EvaluateArgs,
        }

        let missing =
            Harness::try_parse_from(["evaluate", "--policy", "p.yaml", "--case", "c.json"]);
        assert!(missing.is_err());
        let both = Harness::try_parse_from([
            "evaluate", "--policy", "p.yaml", "--case", "c.json", "--decision", "d.json",
            "--recommendations", "r.json",
        ]);
        assert!(both.is_err());
    }
}
