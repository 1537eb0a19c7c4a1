//! # History Subcommand
//!
//! Offline inspection of an exported audit history.
//!
//! ## Subcommands
//!
//! - `verify`: Check the hash chain of every case in the file.
//! - `state`: Fold a case's events into its state, optionally as of a
//!   point in time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use casegate_audit::{verify_events, AuditEvent, AuditStore, InMemoryAuditStore};
use casegate_core::{CaseId, Timestamp};

/// Arguments for the `casegate history` subcommand.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

/// History subcommands.
#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Verify the hash chain of every case.
    Verify {
        /// Exported audit history (JSON array of events).
        #[arg(long)]
        history: PathBuf,
    },

    /// Reconstruct a case's state from its events.
    State {
        /// Exported audit history (JSON array of events).
        #[arg(long)]
        history: PathBuf,
        /// Case to reconstruct.
        #[arg(long)]
        case: CaseId,
        /// Only fold events at or before this RFC 3339 UTC time.
        #[arg(long, value_parser = crate::parse_timestamp)]
        as_of: Option<Timestamp>,
        /// Write the case here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Execute the history subcommand.
pub fn run_history(args: &HistoryArgs) -> Result<u8> {
    match &args.command {
        HistoryCommand::Verify { history } => cmd_verify(history),
        HistoryCommand::State {
            history,
            case,
            as_of,
            out,
        } => cmd_state(history, case, *as_of, out.as_deref()),
    }
}

fn cmd_verify(history: &std::path::Path) -> Result<u8> {
    let events: Vec<AuditEvent> = crate::read_json(history)?;
    let mut by_case: BTreeMap<CaseId, Vec<AuditEvent>> = BTreeMap::new();
    for event in events {
        by_case.entry(event.case_id).or_default().push(event);
    }

    let total = by_case.len();
    let mut failed = 0usize;
    for (case_id, mut events) in by_case {
        events.sort_by_key(|e| e.sequence);
        match verify_events(&events) {
            Ok(()) => println!("OK: {case_id} ({} events)", events.len()),
            Err(e) => {
                println!("FAIL: {case_id}: {e}");
                failed += 1;
            }
        }
    }

    println!("Cases: {}/{} verified", total - failed, total);
    Ok(if failed > 0 { 1 } else { 0 })
}

fn cmd_state(
    history: &std::path::Path,
    case_id: &CaseId,
    as_of: Option<Timestamp>,
    out: Option<&std::path::Path>,
) -> Result<u8> {
    let events: Vec<AuditEvent> = crate::read_json(history)?;
    let audit = InMemoryAuditStore::new();
    audit
        .import(events)
        .with_context(|| format!("history {} failed verification", history.display()))?;
    let case = audit.reconstruct_state(case_id, as_of)?;
    crate::emit_json(&case, out)?;
    Ok(0)
}
