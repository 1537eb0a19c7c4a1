//! # Actors
//!
//! Who requested a state change. The transition table authorizes by
//! `role`; `actor_type` and `id` are recorded for the audit trail.

use serde::{Deserialize, Serialize};

/// The kind of principal behind an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// The core itself (automated decisions, SLA expiry).
    System,
    /// A human reviewer or operator.
    Human,
    /// An external API client.
    Api,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::Human => "human",
            Self::Api => "api",
        })
    }
}

/// A principal requesting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Kind of principal.
    pub actor_type: ActorType,
    /// Identity of the principal (user id, API client id), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Role checked against a transition's allowed roles.
    pub role: String,
}

impl Actor {
    /// The plain `system` actor (SLA expiry, intake processing).
    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            id: None,
            role: "system".to_string(),
        }
    }

    /// A system actor acting under an explicit role (e.g. `workflow_engine`).
    pub fn system_as(role: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::System,
            id: None,
            role: role.into(),
        }
    }

    /// A human actor with identity and role.
    pub fn human(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Human,
            id: Some(id.into()),
            role: role.into(),
        }
    }

    /// An API client with identity and role.
    pub fn api(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Api,
            id: Some(id.into()),
            role: role.into(),
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}({})", self.actor_type, id, self.role),
            None => write!(f, "{}({})", self.actor_type, self.role),
        }
    }
}
