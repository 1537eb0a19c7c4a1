//! # casegate-cli — CLI Tool for the Decision Core
//!
//! Provides the `casegate` command-line interface over the policy,
//! ensemble, state and replay crates. Every subcommand works on local
//! files; nothing is persisted between invocations except what is written
//! with `--out` or `--history-out`.
//!
//! ## Subcommands
//!
//! - `casegate validate`: Validate policy documents.
//! - `casegate vote`: Synthesize an ensemble decision from recorded recommendations.
//! - `casegate evaluate`: Run the rule evaluator for a case, decision, and evidence.
//! - `casegate process`: Drive one case through the pipeline with scripted agents.
//! - `casegate simulate`: Replay recorded decisions under an alternate policy.
//! - `casegate history`: Verify an exported audit history or reconstruct a case from it.
//!
//! ```bash
//! casegate validate policies/kyc_v1.yaml policies/kyc_v2.yaml
//! casegate process --policy policies/kyc_v1.yaml --recommendations recs.json --history-out history.json
//! casegate simulate --history history.json --policy policies/kyc_v1.yaml --policy policies/kyc_v2.yaml --against pol_kyc_v2
//! ```

pub mod evaluate;
pub mod history;
pub mod process;
pub mod simulate;
pub mod validate;
pub mod vote;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use casegate_core::Timestamp;
use casegate_policy::{Policy, PolicyRegistry};
use casegate_state::EngineConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a policy document. `.json` files are read as JSON, anything else
/// as YAML.
pub fn load_policy(path: &Path) -> Result<Policy> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy {}", path.display()))?;
    let policy = if is_json(path) {
        Policy::from_json_str(&content)
    } else {
        Policy::from_yaml_str(&content)
    };
    policy.with_context(|| format!("failed to parse policy {}", path.display()))
}

/// Register every policy in `paths`. Documents marked `active` are
/// activated in file order, so a later file wins its vertical.
pub fn load_registry(paths: &[PathBuf]) -> Result<PolicyRegistry> {
    let registry = PolicyRegistry::new();
    for path in paths {
        let policy = load_policy(path)?;
        registry
            .register(policy)
            .with_context(|| format!("failed to register policy {}", path.display()))?;
    }
    Ok(registry)
}

/// Engine configuration from `--config` (or defaults), with environment
/// overrides applied.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            EngineConfig::from_yaml_str(&content)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Pretty-print `value` as JSON to `out`, or to stdout when `out` is `None`.
pub fn emit_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// Clap value parser for RFC 3339 UTC timestamps.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    Timestamp::parse(s).map_err(|e| e.to_string())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
