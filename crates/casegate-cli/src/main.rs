//! # casegate CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Logs go to stderr so JSON reports on stdout can be piped.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use casegate_cli::evaluate::{run_evaluate, EvaluateArgs};
use casegate_cli::history::{run_history, HistoryArgs};
use casegate_cli::process::{run_process, ProcessArgs};
use casegate_cli::simulate::{run_simulate, SimulateArgs};
use casegate_cli::validate::{run_validate, ValidateArgs};
use casegate_cli::vote::{run_vote, VoteArgs};

/// casegate: policy-governed case decisions.
///
/// Validate policies, run ensemble votes and rule evaluation, process a
/// case end to end, and replay recorded decisions under other policies.
#[derive(Parser, Debug)]
#[command(name = "casegate", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). Ignored
    /// when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate policy documents.
    Validate(ValidateArgs),

    /// Synthesize an ensemble decision from agent recommendations.
    Vote(VoteArgs),

    /// Evaluate policy rules for a case and decision.
    Evaluate(EvaluateArgs),

    /// Process one case through the decision pipeline with scripted agents.
    Process(ProcessArgs),

    /// Replay recorded decisions under an alternate policy.
    Simulate(SimulateArgs),

    /// Verify or fold an exported audit history.
    History(HistoryArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "casegate CLI starting");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Vote(args) => run_vote(&args),
        Commands::Evaluate(args) => run_evaluate(&args),
        Commands::Process(args) => casegate_cli::load_engine_config(cli.config.as_deref())
            .and_then(|config| run_process(&args, &config)),
        Commands::Simulate(args) => run_simulate(&args),
        Commands::History(args) => run_history(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_cli::history::HistoryCommand;
    use casegate_core::CasePriority;

    #[test]
    fn cli_parse_validate_paths() {
        let cli = Cli::try_parse_from(["casegate", "validate", "a.yaml", "b.json"]).unwrap();
        if let Commands::Validate(args) = cli.command {
            assert_eq!(args.paths, vec![PathBuf::from("a.yaml"), PathBuf::from("b.json")]);
        } else {
            panic!("expected validate");
        }
    }

    #[test]
    fn cli_parse_validate_requires_a_path() {
        assert!(Cli::try_parse_from(["casegate", "validate"]).is_err());
    }

    #[test]
    fn cli_parse_process_with_global_flags() {
        let cli = Cli::try_parse_from([
            "casegate",
            "-vv",
            "process",
            "--policy",
            "policies/kyc_v1.yaml",
            "--policy",
            "policies/kyc_v2.yaml",
            "--recommendations",
            "recs.json",
            "--priority",
            "urgent",
            "--config",
            "engine.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("engine.yaml")));
        if let Commands::Process(args) = cli.command {
            assert_eq!(args.policies.len(), 2);
            assert_eq!(args.priority, CasePriority::Urgent);
            assert_eq!(args.vertical, "kyc");
        } else {
            panic!("expected process");
        }
    }

    #[test]
    fn cli_parse_process_rejects_unknown_priority() {
        let result = Cli::try_parse_from([
            "casegate",
            "process",
            "--policy",
            "p.yaml",
            "--recommendations",
            "r.json",
            "--priority",
            "whenever",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_vote_case_id() {
        let cli = Cli::try_parse_from([
            "casegate",
            "vote",
            "--policy",
            "p.yaml",
            "--recommendations",
            "r.json",
            "--case-id",
            "case:7d0f6f7e-4a0e-4c55-9d38-5f1c1d2b8a10",
        ])
        .unwrap();
        if let Commands::Vote(args) = cli.command {
            assert!(args.case_id.is_some());
        } else {
            panic!("expected vote");
        }
    }

    #[test]
    fn cli_parse_simulate() {
        let cli = Cli::try_parse_from([
            "casegate",
            "simulate",
            "--history",
            "history.json",
            "--policy",
            "v1.yaml",
            "--against",
            "pol_kyc_v2",
        ])
        .unwrap();
        if let Commands::Simulate(args) = cli.command {
            assert_eq!(args.against, "pol_kyc_v2");
            assert!(args.case.is_none());
        } else {
            panic!("expected simulate");
        }
    }

    #[test]
    fn cli_parse_history_state_as_of() {
        let cli = Cli::try_parse_from([
            "casegate",
            "history",
            "state",
            "--history",
            "history.json",
            "--case",
            "7d0f6f7e-4a0e-4c55-9d38-5f1c1d2b8a10",
            "--as-of",
            "2026-01-15T12:00:00Z",
        ])
        .unwrap();
        let Commands::History(args) = cli.command else {
            panic!("expected history");
        };
        assert!(matches!(args.command, HistoryCommand::State { as_of: Some(_), .. }));
    }

    #[test]
    fn cli_parse_history_state_rejects_bad_time() {
        let result = Cli::try_parse_from([
            "casegate",
            "history",
            "state",
            "--history",
            "h.json",
            "--case",
            "7d0f6f7e-4a0e-4c55-9d38-5f1c1d2b8a10",
            "--as-of",
            "noon",
        ]);
        assert!(result.is_err());
    }
}
