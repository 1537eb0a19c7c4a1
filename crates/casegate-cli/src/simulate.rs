//! # Simulate Subcommand
//!
//! Replays the recorded automated decisions of an exported audit history
//! under an alternate policy version and reports which outcomes would
//! change. The history is loaded into a throwaway store after its hash
//! chains are verified; nothing is written back.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use casegate_audit::{AuditEvent, InMemoryAuditStore};
use casegate_core::{CaseId, PolicyId};
use casegate_replay::SimulationEngine;

/// Arguments for the `casegate simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Exported audit history (JSON array of events).
    #[arg(long)]
    pub history: PathBuf,

    /// Policy documents: every policy the history references, plus the alternate.
    #[arg(long = "policy", value_name = "POLICY", required = true)]
    pub policies: Vec<PathBuf>,

    /// Policy id to simulate under.
    #[arg(long)]
    pub against: String,

    /// Simulate a single case instead of every case in the history.
    #[arg(long)]
    pub case: Option<CaseId>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute the simulate subcommand.
pub fn run_simulate(args: &SimulateArgs) -> Result<u8> {
    let events: Vec<AuditEvent> = crate::read_json(&args.history)?;
    let audit = InMemoryAuditStore::new();
    let imported = audit
        .import(events)
        .with_context(|| format!("history {} failed verification", args.history.display()))?;
    tracing::info!(events = imported, "loaded audit history");

    let registry = crate::load_registry(&args.policies)?;
    let engine = SimulationEngine::new(Arc::new(audit), Arc::new(registry));
    let against = PolicyId::new(args.against.as_str());

    match &args.case {
        Some(case_id) => {
            let result = engine.simulate(case_id, &against)?;
            crate::emit_json(&result, args.out.as_deref())?;
        }
        None => {
            let report = engine.simulate_all(&against)?;
            eprintln!(
                "Simulated {} case(s) under {against}: {} changed, {} skipped",
                report.results.len(),
                report.changed_count(),
                report.skipped.len()
            );
            crate::emit_json(&report, args.out.as_deref())?;
        }
    }
    Ok(0)
}
