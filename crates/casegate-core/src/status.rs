//! # Case States and Transition Patterns
//!
//! Case states form a tree through dot-segmented names:
//!
//! ```text
//! draft
//! submitted
//! processing
//! under_review
//! ├── under_review.identity_check
//! ├── under_review.fraud_check
//! ├── under_review.compliance_check
//! └── under_review.manual_review
//! needs_more_info
//! approved   (terminal)
//! rejected   (terminal)
//! expired    (terminal)
//! ```
//!
//! The tree is encoded as a tagged enum ([`CaseStatus`]); the dotted form
//! appears only at the serde/display boundary. Transition tables key on
//! [`StatePattern`]s, and [`StatePattern::matches`] is the single place
//! where `X.*` and `*` are interpreted.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Review Stages ────────────────────────────────────────────────────

/// Child states of `under_review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReviewStage {
    /// `under_review.identity_check`
    IdentityCheck,
    /// `under_review.fraud_check`
    FraudCheck,
    /// `under_review.compliance_check`
    ComplianceCheck,
    /// `under_review.manual_review`
    ManualReview,
}

impl ReviewStage {
    /// The segment name below `under_review`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityCheck => "identity_check",
            Self::FraudCheck => "fraud_check",
            Self::ComplianceCheck => "compliance_check",
            Self::ManualReview => "manual_review",
        }
    }
}

// ── Case Status ──────────────────────────────────────────────────────

/// The lifecycle state of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CaseStatus {
    /// Created, not yet submitted.
    Draft,
    /// Submitted by the applicant, awaiting intake.
    Submitted,
    /// Evidence and agent recommendations being gathered.
    Processing,
    /// Under review, either generally or at a specific stage.
    UnderReview(Option<ReviewStage>),
    /// Waiting on the applicant.
    NeedsMoreInfo,
    /// Approved. Terminal.
    Approved,
    /// Rejected. Terminal.
    Rejected,
    /// SLA breached. Terminal.
    Expired,
}

impl CaseStatus {
    /// Every concrete state, in lifecycle order.
    pub const ALL: [CaseStatus; 12] = [
        Self::Draft,
        Self::Submitted,
        Self::Processing,
        Self::UnderReview(None),
        Self::UnderReview(Some(ReviewStage::IdentityCheck)),
        Self::UnderReview(Some(ReviewStage::FraudCheck)),
        Self::UnderReview(Some(ReviewStage::ComplianceCheck)),
        Self::UnderReview(Some(ReviewStage::ManualReview)),
        Self::NeedsMoreInfo,
        Self::Approved,
        Self::Rejected,
        Self::Expired,
    ];

    /// The states that accept no outbound transition, whatever the policy says.
    pub const TERMINAL: [CaseStatus; 3] = [Self::Approved, Self::Rejected, Self::Expired];

    /// Whether this state is one of the built-in terminal states.
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// The dotted name, e.g. `under_review.fraud_check`.
    pub fn dotted(&self) -> String {
        match self {
            Self::UnderReview(Some(stage)) => format!("under_review.{}", stage.as_str()),
            other => other.root_segment().to_string(),
        }
    }

    /// The first segment of the dotted name.
    pub fn root_segment(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::UnderReview(_) => "under_review",
            Self::NeedsMoreInfo => "needs_more_info",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// The parent state, if this state is a child in the tree.
    pub fn parent(&self) -> Option<CaseStatus> {
        match self {
            Self::UnderReview(Some(_)) => Some(Self::UnderReview(None)),
            _ => None,
        }
    }

    /// Whether `self` lies strictly below `ancestor` in the state tree.
    pub fn is_descendant_of(&self, ancestor: &CaseStatus) -> bool {
        let mut current = self.parent();
        while let Some(state) = current {
            if state == *ancestor {
                return true;
            }
            current = state.parent();
        }
        false
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl FromStr for CaseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.dotted() == s)
            .ok_or_else(|| CoreError::UnknownState(s.to_string()))
    }
}

impl TryFrom<String> for CaseStatus {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CaseStatus> for String {
    fn from(status: CaseStatus) -> Self {
        status.dotted()
    }
}

// ── State Patterns ───────────────────────────────────────────────────

/// The source side of a transition-table entry.
///
/// - `*` matches every state.
/// - `X.*` matches every strict descendant of `X`.
/// - any other name matches exactly that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatePattern {
    /// `*`
    Any,
    /// `X.*`
    DescendantsOf(CaseStatus),
    /// `X`
    Exact(CaseStatus),
}

impl StatePattern {
    /// Whether `status` is matched by this pattern.
    ///
    /// This is the only routine that interprets wildcard patterns; the
    /// transition controller and the policy validator both call it.
    pub fn matches(&self, status: &CaseStatus) -> bool {
        match self {
            Self::Any => true,
            Self::DescendantsOf(ancestor) => status.is_descendant_of(ancestor),
            Self::Exact(state) => state == status,
        }
    }

    /// Whether this pattern can match at least one concrete state.
    pub fn matches_any_state(&self) -> bool {
        CaseStatus::ALL.iter().any(|s| self.matches(s))
    }
}

impl std::fmt::Display for StatePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::DescendantsOf(state) => write!(f, "{state}.*"),
            Self::Exact(state) => write!(f, "{state}"),
        }
    }
}

impl FromStr for StatePattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::Any);
        }
        if let Some(prefix) = s.strip_suffix(".*") {
            let ancestor: CaseStatus =
                prefix.parse().map_err(|_| CoreError::InvalidStatePattern {
                    pattern: s.to_string(),
                    reason: format!("prefix {prefix:?} is not a known state"),
                })?;
            return Ok(Self::DescendantsOf(ancestor));
        }
        if s.contains('*') {
            return Err(CoreError::InvalidStatePattern {
                pattern: s.to_string(),
                reason: "wildcards are only allowed as `*` or a trailing `.*`".to_string(),
            });
        }
        Ok(Self::Exact(s.parse()?))
    }
}

impl TryFrom<String> for StatePattern {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StatePattern> for String {
    fn from(pattern: StatePattern) -> Self {
        pattern.to_string()
    }
}
