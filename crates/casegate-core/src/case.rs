//! # Case
//!
//! One instance of a document-driven decision process under a fixed
//! policy version. The [`Case`] value held by the case store is a cache of
//! the last fold over the case's audit history; it is mutated only by the
//! transition controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::{CaseId, PolicyId};
use crate::status::CaseStatus;
use crate::temporal::Timestamp;

/// Case priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    /// Low priority.
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// High priority.
    High,
    /// Urgent.
    Urgent,
}

impl CasePriority {
    /// Numeric ordering weight for review queues.
    pub fn queue_weight(self) -> u32 {
        match self {
            Self::Urgent => 100,
            Self::High => 75,
            Self::Normal => 50,
            Self::Low => 25,
        }
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for CasePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A case and its current (cached) state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier.
    pub case_id: CaseId,
    /// Business vertical (`kyc`, `insurance`, ...).
    pub vertical: String,
    /// Current lifecycle state.
    pub status: CaseStatus,
    /// Case priority.
    pub priority: CasePriority,
    /// The policy version this case is governed by.
    pub policy_version: PolicyId,
    /// Deadline for the current review step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_deadline: Option<Timestamp>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// When the case was created.
    pub created_at: Timestamp,
    /// Time of the last audit event folded into this value.
    pub updated_at: Timestamp,
    /// Sequence number of the last audit event folded into this value.
    pub version: u64,
}

impl Case {
    /// Whether the case has reached a terminal state.
    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the SLA deadline has passed as of `now`.
    pub fn sla_breached(&self, now: Timestamp) -> bool {
        self.sla_deadline.is_some_and(|deadline| now > deadline)
    }
}
