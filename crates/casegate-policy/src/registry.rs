//! # Policy Registry
//!
//! Holds every registered policy version and the active version per
//! vertical. Reads hand out `Arc` snapshots, so an evaluation keeps using
//! one immutable policy even if another version is activated mid-run.
//!
//! Registration is idempotent for identical documents and rejects a
//! different document under an existing `policy_id`.

use std::collections::BTreeMap;
use std::sync::Arc;

use casegate_core::PolicyId;
use parking_lot::RwLock;

use crate::error::PolicyError;
use crate::policy::Policy;
use crate::validated::ValidatedPolicy;

#[derive(Debug, Default)]
struct RegistryState {
    policies: BTreeMap<PolicyId, Arc<ValidatedPolicy>>,
    /// vertical → active policy id
    active: BTreeMap<String, PolicyId>,
}

/// Versioned policy store with one active policy per vertical.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    state: RwLock<RegistryState>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a document, activating it if it is marked
    /// `active`.
    pub fn register(&self, policy: Policy) -> Result<Arc<ValidatedPolicy>, PolicyError> {
        let activate = policy.active;
        let validated = ValidatedPolicy::new(policy)?;
        self.register_validated(validated, activate)
    }

    /// Register an already validated policy.
    pub fn register_validated(
        &self,
        policy: ValidatedPolicy,
        activate: bool,
    ) -> Result<Arc<ValidatedPolicy>, PolicyError> {
        let mut state = self.state.write();
        let id = policy.policy_id().clone();

        let stored = match state.policies.get(&id) {
            Some(existing) if existing.digest() == policy.digest() => Arc::clone(existing),
            Some(_) => return Err(PolicyError::Immutable(id)),
            None => {
                let stored = Arc::new(policy);
                state.policies.insert(id.clone(), Arc::clone(&stored));
                tracing::info!(
                    policy_id = %id,
                    vertical = %stored.vertical(),
                    version = %stored.policy().version,
                    digest = %stored.digest(),
                    "policy registered"
                );
                stored
            }
        };

        if activate {
            Self::activate_locked(&mut state, &stored);
        }
        Ok(stored)
    }

    /// Make `policy_id` the active policy of its vertical, returning the
    /// previously active id, if any.
    pub fn activate(&self, policy_id: &PolicyId) -> Result<Option<PolicyId>, PolicyError> {
        let mut state = self.state.write();
        let policy = state
            .policies
            .get(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownPolicy(policy_id.clone()))?;
        Ok(Self::activate_locked(&mut state, &policy))
    }

    fn activate_locked(state: &mut RegistryState, policy: &ValidatedPolicy) -> Option<PolicyId> {
        let previous = state
            .active
            .insert(policy.vertical().to_string(), policy.policy_id().clone());
        if previous.as_ref() != Some(policy.policy_id()) {
            tracing::info!(
                vertical = %policy.vertical(),
                policy_id = %policy.policy_id(),
                previous = ?previous.as_ref().map(PolicyId::as_str),
                "policy activated"
            );
        }
        previous.filter(|p| p != policy.policy_id())
    }

    /// Snapshot of a policy by id.
    pub fn get(&self, policy_id: &PolicyId) -> Result<Arc<ValidatedPolicy>, PolicyError> {
        self.state
            .read()
            .policies
            .get(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownPolicy(policy_id.clone()))
    }

    /// Snapshot of the active policy for a vertical.
    pub fn active_for(&self, vertical: &str) -> Result<Arc<ValidatedPolicy>, PolicyError> {
        let state = self.state.read();
        state
            .active
            .get(vertical)
            .and_then(|id| state.policies.get(id))
            .cloned()
            .ok_or_else(|| PolicyError::NoActivePolicy(vertical.to_string()))
    }

    pub fn is_active(&self, policy_id: &PolicyId) -> bool {
        self.state.read().active.values().any(|id| id == policy_id)
    }

    /// Registered ids in order.
    pub fn policy_ids(&self) -> Vec<PolicyId> {
        self.state.read().policies.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_core::ActionType;

    const BASE: &str = r#"
policy_id: pol_kyc_v1
vertical: kyc
version: "1"
active: true
voting_strategy:
  strategy: risk_weighted
rules:
  - priority: 99
    name: default
    condition: "*"
    action: manual_review
state_machine:
  states: [draft, submitted]
  transitions:
    - from: draft
      to: submitted
      allowed_roles: [api]
"#;

    fn version(id: &str, active: bool) -> Policy {
        let mut p = Policy::from_yaml_str(BASE).unwrap();
        p.policy_id = PolicyId::new(id);
        p.active = active;
        p
    }

    #[test]
    fn test_register_and_activate() {
        let registry = PolicyRegistry::new();
        registry.register(version("pol_kyc_v1", true)).unwrap();
        assert_eq!(registry.active_for("kyc").unwrap().policy_id().as_str(), "pol_kyc_v1");

        registry.register(version("pol_kyc_v2", false)).unwrap();
        assert_eq!(registry.active_for("kyc").unwrap().policy_id().as_str(), "pol_kyc_v1");

        let previous = registry.activate(&PolicyId::new("pol_kyc_v2")).unwrap();
        assert_eq!(previous, Some(PolicyId::new("pol_kyc_v1")));
        assert!(registry.is_active(&PolicyId::new("pol_kyc_v2")));
        assert!(!registry.is_active(&PolicyId::new("pol_kyc_v1")));
    }

    #[test]
    fn test_snapshot_survives_activation() {
        let registry = PolicyRegistry::new();
        registry.register(version("pol_kyc_v1", true)).unwrap();
        let snapshot = registry.active_for("kyc").unwrap();
        registry.register(version("pol_kyc_v2", true)).unwrap();
        assert_eq!(snapshot.policy_id().as_str(), "pol_kyc_v1");
        assert_eq!(registry.active_for("kyc").unwrap().policy_id().as_str(), "pol_kyc_v2");
    }

    #[test]
    fn test_immutable_once_registered() {
        let registry = PolicyRegistry::new();
        registry.register(version("pol_kyc_v1", true)).unwrap();
        // Identical content is idempotent.
        registry.register(version("pol_kyc_v1", false)).unwrap();

        let mut changed = version("pol_kyc_v1", false);
        changed.rules[0].action = ActionType::Reject;
        assert!(matches!(registry.register(changed), Err(PolicyError::Immutable(_))));
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = PolicyRegistry::new();
        assert!(matches!(registry.active_for("kyc"), Err(PolicyError::NoActivePolicy(_))));
        assert!(matches!(
            registry.activate(&PolicyId::new("nope")),
            Err(PolicyError::UnknownPolicy(_))
        ));
    }
}
