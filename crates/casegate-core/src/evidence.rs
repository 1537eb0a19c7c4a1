//! # Evidence Snapshot
//!
//! Normalized, vendor-agnostic evidence arrives at the core already
//! extracted. The core only needs a read-only view keyed by evidence type
//! (`identity`, `address`, `compliance`, `risk_assessment`, ...). The
//! snapshot is captured into audit events so that simulation can re-run
//! rules against exactly what the original decision saw.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Evidence data keyed by evidence type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSnapshot(BTreeMap<String, Value>);

impl EvidenceSnapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one evidence entry.
    pub fn with(mut self, evidence_type: impl Into<String>, data: Value) -> Self {
        self.0.insert(evidence_type.into(), data);
        self
    }

    /// Insert one evidence entry.
    pub fn insert(&mut self, evidence_type: impl Into<String>, data: Value) {
        self.0.insert(evidence_type.into(), data);
    }

    /// Data for one evidence type.
    pub fn get(&self, evidence_type: &str) -> Option<&Value> {
        self.0.get(evidence_type)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether no evidence was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The snapshot as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl FromIterator<(String, Value)> for EvidenceSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
