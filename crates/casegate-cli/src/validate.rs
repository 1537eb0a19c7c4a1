//! # Validate Subcommand
//!
//! Structural validation of policy documents: rule priorities and names,
//! condition syntax, the voting-strategy block, and the transition table.
//! The files are also registered together, so two documents claiming the
//! same `policy_id` with different content are reported.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use casegate_policy::{PolicyRegistry, ValidatedPolicy};

/// Arguments for the `casegate validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Policy documents (YAML, or JSON with a `.json` extension).
    #[arg(value_name = "POLICY", required = true)]
    pub paths: Vec<PathBuf>,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 if every document is valid, 1 otherwise.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let registry = PolicyRegistry::new();
    let mut failed = 0usize;

    for path in &args.paths {
        match check(path, &registry) {
            Ok(policy) => {
                println!(
                    "OK: {} ({} v{}, {} rules)",
                    path.display(),
                    policy.policy_id(),
                    policy.policy().version,
                    policy.rules().len()
                );
                if !policy.has_default_rule() {
                    println!("  WARN: no '*' default rule; unmatched cases will fail processing");
                }
            }
            Err(e) => {
                println!("FAIL: {}: {e:#}", path.display());
                failed += 1;
            }
        }
    }

    let total = args.paths.len();
    println!("Policies: {}/{} passed", total - failed, total);
    Ok(if failed > 0 { 1 } else { 0 })
}

fn check(path: &std::path::Path, registry: &PolicyRegistry) -> Result<Arc<ValidatedPolicy>> {
    let policy = ValidatedPolicy::new(crate::load_policy(path)?)?;
    Ok(registry.register_validated(policy, false)?)
}
