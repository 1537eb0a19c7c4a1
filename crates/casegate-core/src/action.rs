//! # Actions and the Severity Order
//!
//! The vocabulary of outcomes an agent can recommend, a rule can select, or
//! a reviewer can decide, together with the fixed severity order used for
//! every tie-break and floor in the core:
//!
//! ```text
//! reject > escalate > manual_review > request_more_info > approve
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A recommended or decided action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Approve the case.
    Approve,
    /// Ask the applicant for more information.
    RequestMoreInfo,
    /// Route to a human reviewer.
    ManualReview,
    /// Route to a senior reviewer.
    Escalate,
    /// Reject the case.
    Reject,
}

impl ActionType {
    /// Every action, least severe first.
    pub const ALL: [ActionType; 5] = [
        Self::Approve,
        Self::RequestMoreInfo,
        Self::ManualReview,
        Self::Escalate,
        Self::Reject,
    ];

    /// Position in the severity order. Higher is more severe.
    pub fn severity(self) -> u8 {
        match self {
            Self::Approve => 0,
            Self::RequestMoreInfo => 1,
            Self::ManualReview => 2,
            Self::Escalate => 3,
            Self::Reject => 4,
        }
    }

    /// The more severe of two actions.
    pub fn max_severity(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// The most severe action in `actions`, or `None` if empty.
    pub fn most_severe<I>(actions: I) -> Option<ActionType>
    where
        I: IntoIterator<Item = ActionType>,
    {
        actions.into_iter().reduce(ActionType::max_severity)
    }

    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::RequestMoreInfo => "request_more_info",
            Self::ManualReview => "manual_review",
            Self::Escalate => "escalate",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(ActionType::Reject.severity() > ActionType::Escalate.severity());
        assert!(ActionType::Escalate.severity() > ActionType::ManualReview.severity());
        assert!(ActionType::ManualReview.severity() > ActionType::RequestMoreInfo.severity());
        assert!(ActionType::RequestMoreInfo.severity() > ActionType::Approve.severity());
    }

    #[test]
    fn test_most_severe() {
        let actions = [ActionType::Approve, ActionType::Escalate, ActionType::ManualReview];
        assert_eq!(ActionType::most_severe(actions), Some(ActionType::Escalate));
        assert_eq!(ActionType::most_severe(Vec::new()), None);
    }

    #[test]
    fn test_parse_roundtrip_names() {
        for action in ActionType::ALL {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
        assert!("maybe".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ActionType::ManualReview).unwrap();
        assert_eq!(json, "\"manual_review\"");
    }
}
